use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::now_stamp;
use crate::error::{is_unique_violation, Error, Result};
use crate::model::{Class, ClassDetail};
use crate::store::students;
use crate::validate::ClassInput;

// Correlated subquery so the count never double-counts through a join.
const CLASS_SELECT: &str = "SELECT
       c.id,
       c.name,
       c.grade,
       c.created_at,
       (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count
     FROM classes c";

fn row_to_class(row: &Row) -> rusqlite::Result<Class> {
    Ok(Class {
        id: row.get(0)?,
        name: row.get(1)?,
        grade: row.get(2)?,
        created_at: row.get(3)?,
        student_count: row.get(4)?,
    })
}

pub fn list(conn: &Connection) -> Result<Vec<Class>> {
    let sql = format!("{} ORDER BY c.grade, c.name", CLASS_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let classes = stmt
        .query_map([], row_to_class)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(classes)
}

pub fn find(conn: &Connection, class_id: &str) -> Result<Option<Class>> {
    let sql = format!("{} WHERE c.id = ?", CLASS_SELECT);
    Ok(conn
        .query_row(&sql, [class_id], row_to_class)
        .optional()?)
}

pub fn get(conn: &Connection, class_id: &str) -> Result<Class> {
    find(conn, class_id)?.ok_or_else(|| Error::not_found("class", class_id))
}

pub fn get_detail(conn: &Connection, class_id: &str) -> Result<ClassDetail> {
    let class = get(conn, class_id)?;
    let students = students::list_for_class(conn, class_id)?;
    Ok(ClassDetail { class, students })
}

pub fn exists(conn: &Connection, class_id: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

fn ensure_unique(conn: &Connection, input: &ClassInput, except_id: Option<&str>) -> Result<()> {
    let clash: Option<String> = conn
        .query_row(
            "SELECT id FROM classes WHERE name = ? AND grade = ? AND id <> COALESCE(?, '')",
            (&input.name, input.grade, except_id),
            |r| r.get(0),
        )
        .optional()?;
    if clash.is_some() {
        warn!(name = %input.name, grade = input.grade, "duplicate class rejected");
        return Err(duplicate(input));
    }
    Ok(())
}

fn duplicate(input: &ClassInput) -> Error {
    Error::conflict(format!(
        "class {} already exists in grade {}",
        input.name, input.grade
    ))
}

/// Map the store's UNIQUE(name, grade) rejection onto the same conflict a
/// pre-check reports, for writes that race past it.
fn map_write_err(input: &ClassInput, e: rusqlite::Error) -> Error {
    if is_unique_violation(&e) {
        duplicate(input)
    } else {
        Error::Store(e)
    }
}

pub fn create(conn: &Connection, input: &ClassInput) -> Result<Class> {
    ensure_unique(conn, input, None)?;
    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name, grade, created_at) VALUES(?, ?, ?, ?)",
        (&class_id, &input.name, input.grade, now_stamp()),
    )
    .map_err(|e| map_write_err(input, e))?;
    info!(class_id = %class_id, name = %input.name, grade = input.grade, "class created");
    get(conn, &class_id)
}

pub fn update(conn: &Connection, class_id: &str, input: &ClassInput) -> Result<Class> {
    if !exists(conn, class_id)? {
        return Err(Error::not_found("class", class_id));
    }
    ensure_unique(conn, input, Some(class_id))?;
    conn.execute(
        "UPDATE classes SET name = ?, grade = ? WHERE id = ?",
        (&input.name, input.grade, class_id),
    )
    .map_err(|e| map_write_err(input, e))?;
    info!(class_id = %class_id, "class updated");
    get(conn, class_id)
}

/// Only empty classes may be deleted.
pub fn delete(conn: &Connection, class_id: &str) -> Result<()> {
    let class = get(conn, class_id)?;
    if class.student_count > 0 {
        warn!(class_id = %class_id, students = class.student_count, "class delete rejected");
        return Err(Error::conflict(format!(
            "cannot delete class {} while it has {} student(s)",
            class.name, class.student_count
        )));
    }
    conn.execute("DELETE FROM classes WHERE id = ?", [class_id])?;
    info!(class_id = %class_id, "class deleted");
    Ok(())
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM classes", [], |r| r.get(0))?)
}
