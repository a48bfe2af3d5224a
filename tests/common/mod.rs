#![allow(dead_code)]

use csvstudio::{CatalogStore, ConnectionManager, TableLoader};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn write_csv(path: &Path, df: &mut DataFrame) {
    let mut file = File::create(path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
}

/// A folder holding `orders.csv` (3 rows) and `customers.csv` (2 rows).
pub fn create_sales_folder(root: &Path) -> PathBuf {
    let folder = root.join("sales");
    fs::create_dir_all(&folder).unwrap();

    let mut orders = df!(
        "id" => [1i64, 2, 3],
        "customer_id" => [10i64, 10, 20],
        "amount" => [12.5f64, 8.0, 100.25]
    )
    .unwrap();
    write_csv(&folder.join("orders.csv"), &mut orders);

    let mut customers = df!(
        "id" => [10i64, 20],
        "name" => ["Ada", "Grace"]
    )
    .unwrap();
    write_csv(&folder.join("customers.csv"), &mut customers);

    folder
}

/// Manager backed by a catalog file inside `dir`.
pub fn manager(dir: &TempDir) -> ConnectionManager {
    let catalog = CatalogStore::open(catalog_path(dir)).unwrap();
    ConnectionManager::new(catalog, TableLoader::default())
}

pub fn catalog_path(dir: &TempDir) -> PathBuf {
    dir.path().join("connections.json")
}
