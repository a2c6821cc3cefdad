use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures_util::TryStreamExt;
use sqlx::MySqlPool;
use tracing::debug;

use super::{Constraint, LedgerStore, RecordPage, RecordQuery, SortDir, SortField, StoreError};
use crate::model::attendance::{AttendanceId, AttendanceRecord, AttendanceRow};

const COLUMNS: &str = r#"
    id, employee_id, employee_name, employee_surname, kind, status, source,
    work_day, clock_in, clock_in_origin, clock_out, clock_out_origin, notes,
    created_at, updated_at
"#;

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Date(NaiveDate),
    Str(&'a str),
}

#[derive(Clone)]
pub struct MySqlLedgerStore {
    pool: MySqlPool,
}

impl MySqlLedgerStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_records(
        &self,
        sql: &str,
        args: Vec<FilterValue<'_>>,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut q = sqlx::query_as::<_, AttendanceRow>(sql);
        for arg in args {
            q = match arg {
                FilterValue::U64(v) => q.bind(v),
                FilterValue::Date(d) => q.bind(d),
                FilterValue::Str(s) => q.bind(s),
            };
        }

        let mut stream = q.fetch(&self.pool);
        let mut records = Vec::new();
        while let Some(row) = stream.try_next().await? {
            records.push(AttendanceRecord::try_from(row)?);
        }
        Ok(records)
    }
}

/// Translates MySQL duplicate-key errors (SQLSTATE 23000) into the constraint
/// that fired; everything else stays a database error.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23000") && db_err.message().contains("Duplicate entry")
        {
            let message = db_err.message();
            let constraint = if message.contains("uq_attendance_active_session") {
                Constraint::ActiveSession
            } else if message.contains("uq_attendance_declaration_day") {
                Constraint::DeclarationDay
            } else if message.contains("uq_attendance_daily_submission") {
                Constraint::DailySubmission
            } else {
                Constraint::PrimaryKey
            };
            return StoreError::Duplicate(constraint);
        }
    }
    StoreError::Database(e)
}

fn order_expr(sort: SortField) -> &'static str {
    match sort {
        // declarations carry no clock-in; they sort at the start of their day
        SortField::ClockIn => "COALESCE(clock_in, TIMESTAMP(work_day))",
        SortField::WorkDay => "work_day",
        SortField::CreatedAt => "created_at",
        SortField::EmployeeId => "employee_id",
    }
}

#[async_trait]
impl LedgerStore for MySqlLedgerStore {
    async fn insert(&self, record: &AttendanceRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO attendance_records
                (id, employee_id, employee_name, employee_surname, kind, status, source,
                 work_day, clock_in, clock_in_origin, clock_out, clock_out_origin, notes,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.employee_id)
        .bind(&record.employee_name)
        .bind(&record.employee_surname)
        .bind(record.entry.kind_str())
        .bind(record.entry.status_str())
        .bind(record.source.as_ref())
        .bind(record.work_day)
        .bind(record.clock_in)
        .bind(&record.clock_in_origin)
        .bind(record.clock_out)
        .bind(&record.clock_out_origin)
        .bind(&record.notes)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(())
    }

    async fn update(&self, record: &AttendanceRecord) -> Result<bool, StoreError> {
        // employee_id and source are never rewritten
        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET employee_name = ?, employee_surname = ?, kind = ?, status = ?,
                work_day = ?, clock_in = ?, clock_in_origin = ?, clock_out = ?,
                clock_out_origin = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.employee_name)
        .bind(&record.employee_surname)
        .bind(record.entry.kind_str())
        .bind(record.entry.status_str())
        .bind(record.work_day)
        .bind(record.clock_in)
        .bind(&record.clock_in_origin)
        .bind(record.clock_out)
        .bind(&record.clock_out_origin)
        .bind(&record.notes)
        .bind(record.updated_at)
        .bind(record.id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn close_active(
        &self,
        id: AttendanceId,
        clock_out: DateTime<Utc>,
        origin: Option<&str>,
        notes: Option<&str>,
    ) -> Result<bool, StoreError> {
        // the WHERE clause is the guard: a row that is no longer open is left alone
        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET status = 'completed', clock_out = ?, clock_out_origin = ?,
                notes = CASE
                    WHEN ? IS NULL THEN notes
                    WHEN notes IS NULL THEN ?
                    ELSE CONCAT(notes, '\n', ?)
                END,
                updated_at = ?
            WHERE id = ? AND kind = 'punch' AND status = 'active'
              AND (clock_in IS NULL OR clock_in <= ?)
            "#,
        )
        .bind(clock_out)
        .bind(origin)
        .bind(notes)
        .bind(notes)
        .bind(notes)
        .bind(clock_out)
        .bind(id.to_string())
        .bind(clock_out)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: AttendanceId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM attendance_records WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get(&self, id: AttendanceId) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!("SELECT {COLUMNS} FROM attendance_records WHERE id = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn find_active(&self, employee_id: u64) -> Result<Option<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance_records \
             WHERE employee_id = ? AND kind = 'punch' AND status = 'active' LIMIT 1"
        );
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(employee_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(AttendanceRecord::try_from).transpose()
    }

    async fn find_by_day(
        &self,
        employee_id: u64,
        day: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance_records \
             WHERE employee_id = ? AND work_day = ? ORDER BY created_at"
        );
        self.fetch_records(&sql, vec![FilterValue::U64(employee_id), FilterValue::Date(day)])
            .await
    }

    async fn list_by_employee(
        &self,
        employee_id: u64,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM attendance_records WHERE employee_id = ? ORDER BY work_day DESC"
        );
        self.fetch_records(&sql, vec![FilterValue::U64(employee_id)])
            .await
    }

    async fn list_in_range(
        &self,
        employee_id: Option<u64>,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let mut where_sql = String::from(" WHERE work_day >= ? AND work_day < ?");
        let mut args = vec![FilterValue::Date(from), FilterValue::Date(until)];

        if let Some(emp_id) = employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(emp_id));
        }

        let sql = format!(
            "SELECT {COLUMNS} FROM attendance_records{where_sql} ORDER BY work_day, created_at"
        );
        self.fetch_records(&sql, args).await
    }

    async fn query(&self, query: &RecordQuery) -> Result<RecordPage, StoreError> {
        // -------------------------
        // WHERE clause
        // -------------------------
        let mut where_sql = String::from(" WHERE 1=1");
        let mut args: Vec<FilterValue> = Vec::new();

        if let Some(emp_id) = query.employee_id {
            where_sql.push_str(" AND employee_id = ?");
            args.push(FilterValue::U64(emp_id));
        }

        if let Some(from) = query.date_from {
            where_sql.push_str(" AND work_day >= ?");
            args.push(FilterValue::Date(from));
        }

        if let Some(to) = query.date_to {
            where_sql.push_str(" AND work_day <= ?");
            args.push(FilterValue::Date(to));
        }

        if let Some(status) = query.status.as_deref() {
            where_sql.push_str(" AND status = ?");
            args.push(FilterValue::Str(status));
        }

        // -------------------------
        // COUNT query
        // -------------------------
        let count_sql = format!("SELECT COUNT(*) FROM attendance_records{}", where_sql);

        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::U64(v) => count_q.bind(*v),
                FilterValue::Date(d) => count_q.bind(*d),
                FilterValue::Str(s) => count_q.bind(*s),
            };
        }

        let total = count_q.fetch_one(&self.pool).await?;

        // -------------------------
        // DATA query
        // -------------------------
        let dir = match query.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        let data_sql = format!(
            "SELECT {COLUMNS} FROM attendance_records{} ORDER BY {} {}, id LIMIT {} OFFSET {}",
            where_sql,
            order_expr(query.sort),
            dir,
            query.per_page,
            query.offset()
        );
        debug!(
            sql = %data_sql,
            page = query.page,
            per_page = query.per_page,
            "Fetching attendance page"
        );

        let records = self.fetch_records(&data_sql, args).await?;

        Ok(RecordPage { records, total })
    }
}
