//! Baseline table definitions.
//!
//! Deployed databases are allowed to drift from these (that is what the adaptive write
//! path tolerates); they are used to bootstrap an empty Postgres database and to seed
//! the in-memory store.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    BigSerial,
    BigInt,
    Int,
    Float,
    Text,
    Date,
    Timestamptz,
    Jsonb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    Now,
    Text(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub col_type: ColumnType,
    pub not_null: bool,
    pub default: Option<ColumnDefault>,
}

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub columns: &'static [ColumnDef],
    /// Multi-column unique constraints.
    pub unique: &'static [&'static [&'static str]],
}

const fn col(name: &'static str, col_type: ColumnType) -> ColumnDef {
    ColumnDef { name, col_type, not_null: false, default: None }
}

const fn req(name: &'static str, col_type: ColumnType) -> ColumnDef {
    ColumnDef { name, col_type, not_null: true, default: None }
}

const fn defaulted(name: &'static str, col_type: ColumnType, default: ColumnDefault) -> ColumnDef {
    ColumnDef { name, col_type, not_null: true, default: Some(default) }
}

pub const DAILY_REPORTS: TableDef = TableDef {
    name: "daily_reports",
    primary_key: "id",
    columns: &[
        req("id", ColumnType::BigSerial),
        req("site_id", ColumnType::Text),
        req("work_date", ColumnType::Date),
        req("status", ColumnType::Text),
        req("author_name", ColumnType::Text),
        col("weather", ColumnType::Text),
        col("headcount", ColumnType::Int),
        col("notes", ColumnType::Text),
        col("work_content", ColumnType::Jsonb),
        col("location", ColumnType::Jsonb),
        col("submitted_at", ColumnType::Timestamptz),
        defaulted("created_at", ColumnType::Timestamptz, ColumnDefault::Now),
        col("updated_at", ColumnType::Timestamptz),
    ],
    unique: &[&["site_id", "work_date"]],
};

pub const DAILY_REPORT_MATERIALS: TableDef = TableDef {
    name: "daily_report_materials",
    primary_key: "id",
    columns: &[
        req("id", ColumnType::BigSerial),
        req("report_id", ColumnType::BigInt),
        req("material_name", ColumnType::Text),
        req("quantity", ColumnType::Float),
        col("unit", ColumnType::Text),
        defaulted("created_at", ColumnType::Timestamptz, ColumnDefault::Now),
    ],
    unique: &[],
};

pub const DAILY_REPORT_PHOTOS: TableDef = TableDef {
    name: "daily_report_photos",
    primary_key: "id",
    columns: &[
        req("id", ColumnType::BigSerial),
        req("report_id", ColumnType::BigInt),
        req("url", ColumnType::Text),
        col("caption", ColumnType::Text),
        defaulted("created_at", ColumnType::Timestamptz, ColumnDefault::Now),
    ],
    unique: &[],
};

pub const MATERIAL_SHIPMENTS: TableDef = TableDef {
    name: "material_shipments",
    primary_key: "id",
    columns: &[
        req("id", ColumnType::BigSerial),
        req("site_id", ColumnType::Text),
        req("material_name", ColumnType::Text),
        col("quantity", ColumnType::Float),
        col("unit", ColumnType::Text),
        defaulted("status", ColumnType::Text, ColumnDefault::Text("pending")),
        col("carrier", ColumnType::Text),
        col("tracking_number", ColumnType::Text),
        col("shipped_at", ColumnType::Timestamptz),
        col("delivered_at", ColumnType::Timestamptz),
        col("received_by", ColumnType::Text),
        col("notes", ColumnType::Text),
        defaulted("created_at", ColumnType::Timestamptz, ColumnDefault::Now),
        col("updated_at", ColumnType::Timestamptz),
    ],
    unique: &[],
};

pub const SALARY_SNAPSHOTS: TableDef = TableDef {
    name: "salary_snapshots",
    primary_key: "id",
    columns: &[
        req("id", ColumnType::BigSerial),
        req("site_id", ColumnType::Text),
        req("worker_id", ColumnType::Text),
        req("period", ColumnType::Text),
        req("blob_key", ColumnType::Text),
        col("digest", ColumnType::Text),
        col("gross_total", ColumnType::Float),
        defaulted("issued_at", ColumnType::Timestamptz, ColumnDefault::Now),
        col("updated_at", ColumnType::Timestamptz),
    ],
    unique: &[&["site_id", "worker_id", "period"]],
};

pub const BASELINE_TABLES: &[TableDef] = &[
    DAILY_REPORTS,
    DAILY_REPORT_MATERIALS,
    DAILY_REPORT_PHOTOS,
    MATERIAL_SHIPMENTS,
    SALARY_SNAPSHOTS,
];

/// Primary key column of a baseline table; `id` for tables outside the baseline.
pub fn primary_key_of(table: &str) -> &'static str {
    BASELINE_TABLES
        .iter()
        .find(|t| t.name == table)
        .map_or("id", |t| t.primary_key)
}

pub fn column_type_to_sql(t: ColumnType) -> &'static str {
    match t {
        ColumnType::BigSerial => "BIGSERIAL",
        ColumnType::BigInt => "BIGINT",
        ColumnType::Int => "INTEGER",
        ColumnType::Float => "DOUBLE PRECISION",
        ColumnType::Text => "TEXT",
        ColumnType::Date => "DATE",
        ColumnType::Timestamptz => "TIMESTAMPTZ",
        ColumnType::Jsonb => "JSONB",
    }
}

/// Renders `CREATE TABLE IF NOT EXISTS` for a baseline table.
pub fn create_table_sql(table: &TableDef) -> String {
    let mut cols_sql: Vec<String> = Vec::with_capacity(table.columns.len() + table.unique.len());
    for c in table.columns {
        let mut col = format!("{} {}", c.name, column_type_to_sql(c.col_type));
        if c.name == table.primary_key {
            col.push_str(" PRIMARY KEY");
        } else if c.not_null {
            col.push_str(" NOT NULL");
        }
        match c.default {
            Some(ColumnDefault::Now) => col.push_str(" DEFAULT now()"),
            Some(ColumnDefault::Text(v)) => col.push_str(&format!(" DEFAULT '{}'", v.replace('\'', "''"))),
            None => {}
        }
        cols_sql.push(col);
    }
    for key in table.unique {
        cols_sql.push(format!("UNIQUE ({})", key.join(", ")));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table.name, cols_sql.join(", "))
}
