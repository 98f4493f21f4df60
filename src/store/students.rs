use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::{local_day_start_stamp, now_stamp};
use crate::error::{Error, Result};
use crate::model::{Gender, Pagination, Student};
use crate::store::{classes, like_pattern, placeholders};
use crate::validate::StudentInput;

const STUDENT_SELECT: &str = "SELECT
       s.id, s.name, s.class_id, c.name, c.grade, s.gender, s.date_of_birth, s.created_at
     FROM students s
     JOIN classes c ON c.id = s.class_id";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFilter {
    pub class_id: Option<String>,
    pub gender: Option<Gender>,
    pub search: Option<String>,
    /// Registration date range in local days, inclusive.
    pub registered_from: Option<NaiveDate>,
    pub registered_to: Option<NaiveDate>,
    /// `None` returns every matching row.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl StudentFilter {
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(class_id) = &self.class_id {
            clauses.push("s.class_id = ?");
            args.push(Value::Text(class_id.clone()));
        }
        if let Some(gender) = self.gender {
            clauses.push("s.gender = ?");
            args.push(Value::Text(gender.as_str().to_string()));
        }
        if let Some(search) = &self.search {
            clauses.push("unicode_lower(s.name) LIKE ? ESCAPE '\\'");
            args.push(Value::Text(like_pattern(search)));
        }
        // Bounds are local calendar days; `created_at` is a UTC stamp.
        if let Some(from) = self.registered_from {
            clauses.push("s.created_at >= ?");
            args.push(Value::Text(local_day_start_stamp(from)));
        }
        if let Some(next) = self.registered_to.and_then(|to| to.succ_opt()) {
            clauses.push("s.created_at < ?");
            args.push(Value::Text(local_day_start_stamp(next)));
        }
        if clauses.is_empty() {
            (String::new(), args)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), args)
        }
    }
}

pub(crate) fn row_to_student(row: &Row) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        class_id: row.get(2)?,
        class_name: row.get(3)?,
        grade: row.get(4)?,
        gender: row.get(5)?,
        date_of_birth: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn list(conn: &Connection, filter: &StudentFilter) -> Result<(Vec<Student>, i64)> {
    let (where_sql, mut args) = filter.where_clause();

    let total: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM students s JOIN classes c ON c.id = s.class_id{}",
            where_sql
        ),
        params_from_iter(args.iter()),
        |r| r.get(0),
    )?;

    let mut sql = format!("{}{} ORDER BY s.name, s.rowid", STUDENT_SELECT, where_sql);
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ? OFFSET ?");
        args.push(Value::Integer(i64::from(limit)));
        args.push(Value::Integer(i64::from(filter.offset)));
    }
    debug!(sql = %sql, "students query");
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map(params_from_iter(args.iter()), row_to_student)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((students, total))
}

pub fn list_page(
    conn: &Connection,
    filter: &StudentFilter,
) -> Result<(Vec<Student>, Pagination)> {
    let (students, total) = list(conn, filter)?;
    Ok((
        students,
        Pagination {
            limit: filter.limit.unwrap_or(0),
            offset: filter.offset,
            total,
        },
    ))
}

pub fn list_for_class(conn: &Connection, class_id: &str) -> Result<Vec<Student>> {
    let filter = StudentFilter {
        class_id: Some(class_id.to_string()),
        ..StudentFilter::default()
    };
    Ok(list(conn, &filter)?.0)
}

pub fn find(conn: &Connection, student_id: &str) -> Result<Option<Student>> {
    let sql = format!("{} WHERE s.id = ?", STUDENT_SELECT);
    Ok(conn
        .query_row(&sql, [student_id], row_to_student)
        .optional()?)
}

pub fn get(conn: &Connection, student_id: &str) -> Result<Student> {
    find(conn, student_id)?.ok_or_else(|| Error::not_found("student", student_id))
}

pub fn exists(conn: &Connection, student_id: &str) -> Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

/// The subset of `ids` that exist, resolved in a single query.
pub fn existing_ids(conn: &Connection, ids: &[&str]) -> Result<HashSet<String>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let sql = format!(
        "SELECT id FROM students WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let found = stmt
        .query_map(params_from_iter(ids.iter()), |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<HashSet<_>>>()?;
    Ok(found)
}

fn require_class(conn: &Connection, class_id: &str) -> Result<()> {
    if classes::exists(conn, class_id)? {
        Ok(())
    } else {
        Err(Error::not_found("class", class_id))
    }
}

pub fn create(conn: &Connection, input: &StudentInput) -> Result<Student> {
    require_class(conn, &input.class_id)?;
    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, class_id, gender, date_of_birth, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &input.name,
            &input.class_id,
            input.gender,
            input.date_of_birth,
            now_stamp(),
        ),
    )?;
    info!(student_id = %student_id, class_id = %input.class_id, "student created");
    get(conn, &student_id)
}

pub fn update(conn: &Connection, student_id: &str, input: &StudentInput) -> Result<Student> {
    if !exists(conn, student_id)? {
        return Err(Error::not_found("student", student_id));
    }
    require_class(conn, &input.class_id)?;
    conn.execute(
        "UPDATE students SET name = ?, class_id = ?, gender = ?, date_of_birth = ? WHERE id = ?",
        (
            &input.name,
            &input.class_id,
            input.gender,
            input.date_of_birth,
            student_id,
        ),
    )?;
    info!(student_id = %student_id, "student updated");
    get(conn, student_id)
}

/// Attendance rows go with the student (ON DELETE CASCADE).
pub fn delete(conn: &Connection, student_id: &str) -> Result<()> {
    let removed = conn.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    if removed == 0 {
        return Err(Error::not_found("student", student_id));
    }
    info!(student_id = %student_id, "student deleted");
    Ok(())
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::validate::ClassInput;

    fn seed_class(conn: &Connection, name: &str) -> String {
        classes::create(
            conn,
            &ClassInput {
                name: name.to_string(),
                grade: 4,
            },
        )
        .expect("class")
        .id
    }

    fn input(name: &str, class_id: &str, gender: Gender) -> StudentInput {
        StudentInput {
            name: name.to_string(),
            class_id: class_id.to_string(),
            gender,
            date_of_birth: NaiveDate::from_ymd_opt(2015, 5, 20).unwrap(),
        }
    }

    #[test]
    fn create_requires_existing_class() {
        let conn = db::open_in_memory().expect("open");
        let err = create(&conn, &input("Nia", "nope", Gender::Female)).expect_err("no class");
        assert!(matches!(err, Error::NotFound { entity: "class", .. }));
    }

    #[test]
    fn create_returns_enriched_student() {
        let conn = db::open_in_memory().expect("open");
        let class_id = seed_class(&conn, "4B");
        let s = create(&conn, &input("Nia", &class_id, Gender::Female)).expect("create");
        assert_eq!(s.class_name, "4B");
        assert_eq!(s.grade, 4);
        assert_eq!(s.date_of_birth, NaiveDate::from_ymd_opt(2015, 5, 20).unwrap());
    }

    #[test]
    fn list_filters_and_paginates() {
        let conn = db::open_in_memory().expect("open");
        let a = seed_class(&conn, "A");
        let b = seed_class(&conn, "B");
        create(&conn, &input("Cara", &a, Gender::Female)).expect("1");
        create(&conn, &input("Abe", &a, Gender::Male)).expect("2");
        create(&conn, &input("Bo", &b, Gender::Male)).expect("3");

        let (all, total) = list(&conn, &StudentFilter::default()).expect("all");
        assert_eq!(total, 3);
        assert_eq!(
            all.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            vec!["Abe", "Bo", "Cara"]
        );

        let males = StudentFilter {
            class_id: Some(a.clone()),
            gender: Some(Gender::Male),
            ..StudentFilter::default()
        };
        let (rows, total) = list(&conn, &males).expect("males");
        assert_eq!(total, 1);
        assert_eq!(rows[0].name, "Abe");

        let page = StudentFilter {
            limit: Some(1),
            offset: 1,
            ..StudentFilter::default()
        };
        let (rows, total) = list(&conn, &page).expect("page");
        assert_eq!(total, 3);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Bo");

        let search = StudentFilter {
            search: Some("AR".to_string()),
            ..StudentFilter::default()
        };
        assert_eq!(list(&conn, &search).expect("search").0[0].name, "Cara");
    }

    #[test]
    fn registration_range_filters_on_created_date() {
        let conn = db::open_in_memory().expect("open");
        let class_id = seed_class(&conn, "R");
        create(&conn, &input("Ola", &class_id, Gender::Female)).expect("create");
        let today = crate::calc::today();
        let covering = StudentFilter {
            registered_from: today.pred_opt(),
            registered_to: today.succ_opt(),
            ..StudentFilter::default()
        };
        assert_eq!(list(&conn, &covering).expect("covering").1, 1);
        let before = StudentFilter {
            registered_to: NaiveDate::from_ymd_opt(2000, 1, 1),
            ..StudentFilter::default()
        };
        assert_eq!(list(&conn, &before).expect("before").1, 0);
    }

    #[test]
    fn registered_today_matches_a_range_ending_today() {
        let conn = db::open_in_memory().expect("open");
        let class_id = seed_class(&conn, "T");
        create(&conn, &input("Pia", &class_id, Gender::Female)).expect("create");
        let today = crate::calc::today();
        let only_today = StudentFilter {
            registered_from: Some(today),
            registered_to: Some(today),
            ..StudentFilter::default()
        };
        assert_eq!(list(&conn, &only_today).expect("today").1, 1);
        let yesterday = StudentFilter {
            registered_to: today.pred_opt(),
            ..StudentFilter::default()
        };
        assert_eq!(list(&conn, &yesterday).expect("yesterday").1, 0);
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let conn = db::open_in_memory().expect("open");
        let class_id = seed_class(&conn, "U");
        create(&conn, &input("Élodie Roux", &class_id, Gender::Female)).expect("create");
        create(&conn, &input("Ömer Şahin", &class_id, Gender::Male)).expect("create");

        for term in ["Élodie", "élo", "ÉLODIE", "lodie"] {
            let filter = StudentFilter {
                search: Some(term.to_string()),
                ..StudentFilter::default()
            };
            let (rows, total) = list(&conn, &filter).expect("search");
            assert_eq!(total, 1, "term {}", term);
            assert_eq!(rows[0].name, "Élodie Roux");
        }
        let filter = StudentFilter {
            search: Some("ömer ş".to_string()),
            ..StudentFilter::default()
        };
        assert_eq!(list(&conn, &filter).expect("search").1, 1);
    }

    #[test]
    fn existing_ids_returns_only_matches() {
        let conn = db::open_in_memory().expect("open");
        let class_id = seed_class(&conn, "C");
        let s = create(&conn, &input("Lee", &class_id, Gender::Male)).expect("create");
        let found = existing_ids(&conn, &[s.id.as_str(), "ghost"]).expect("ids");
        assert_eq!(found.len(), 1);
        assert!(found.contains(&s.id));
    }

    #[test]
    fn class_with_student_cannot_be_deleted() {
        let conn = db::open_in_memory().expect("open");
        let class_id = seed_class(&conn, "Full");
        let s = create(&conn, &input("Kim", &class_id, Gender::Female)).expect("create");
        let err = classes::delete(&conn, &class_id).expect_err("has students");
        assert!(matches!(err, Error::Conflict(_)));
        delete(&conn, &s.id).expect("delete student");
        classes::delete(&conn, &class_id).expect("now empty");
    }

    #[test]
    fn delete_missing_student_is_not_found() {
        let conn = db::open_in_memory().expect("open");
        assert!(matches!(
            delete(&conn, "ghost"),
            Err(Error::NotFound { entity: "student", .. })
        ));
    }
}
