use crate::db::DbError;
use duckdb::Connection;
use tracing::info;

const INVENTORY_DDL: &str = r#"
CREATE OR REPLACE TABLE t_shirts (
    t_shirt_id INTEGER NOT NULL PRIMARY KEY,
    brand VARCHAR NOT NULL CHECK (brand IN ('Van Huesen', 'Levi', 'Nike', 'Adidas')),
    color VARCHAR NOT NULL CHECK (color IN ('Red', 'Blue', 'Black', 'White')),
    size VARCHAR NOT NULL CHECK (size IN ('XS', 'S', 'M', 'L', 'XL')),
    price INTEGER NOT NULL CHECK (price BETWEEN 10 AND 50),
    stock_quantity INTEGER NOT NULL,
    UNIQUE (brand, color, size)
);

CREATE OR REPLACE TABLE discounts (
    t_shirt_id INTEGER NOT NULL,
    pct_discount DECIMAL(5,2) CHECK (pct_discount BETWEEN 0 AND 100)
);
"#;

const INVENTORY_ROWS: &str = r#"
INSERT INTO t_shirts VALUES
    (1, 'Van Huesen', 'Red', 'M', 30, 61),
    (2, 'Levi', 'White', 'S', 26, 79),
    (3, 'Nike', 'White', 'XS', 17, 45),
    (4, 'Adidas', 'Black', 'L', 42, 38),
    (5, 'Nike', 'Blue', 'M', 35, 72),
    (6, 'Levi', 'Black', 'XL', 48, 19),
    (7, 'Van Huesen', 'White', 'S', 23, 54),
    (8, 'Adidas', 'Red', 'XS', 19, 88),
    (9, 'Nike', 'Black', 'S', 29, 27),
    (10, 'Levi', 'Blue', 'M', 33, 90),
    (11, 'Adidas', 'White', 'M', 38, 41),
    (12, 'Van Huesen', 'Blue', 'XL', 44, 13),
    (13, 'Nike', 'Red', 'L', 41, 66),
    (14, 'Levi', 'Red', 'XS', 15, 34),
    (15, 'Adidas', 'Blue', 'S', 21, 57),
    (16, 'Van Huesen', 'Black', 'L', 36, 70);

INSERT INTO discounts VALUES
    (2, 10.00),
    (5, 5.00),
    (6, 15.00),
    (10, 20.00),
    (13, 7.50);
"#;

/// (Re)creates `t_shirts` and `discounts` with the sample inventory.
pub fn seed_inventory(conn: &Connection) -> Result<usize, DbError> {
    conn.execute_batch(INVENTORY_DDL)?;
    conn.execute_batch(INVENTORY_ROWS)?;

    let count: i64 = conn.query_row("SELECT count(*) FROM t_shirts", [], |row| row.get(0))?;
    info!("Seeded inventory with {} t-shirt rows", count);
    Ok(count as usize)
}
