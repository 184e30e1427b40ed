use std::collections::HashMap;

use anyhow::{Context, Result};
use log::info;

use crate::time_entry::TimeEntry;
use crate::upstream::TimeEntryRepository;

/// 従業員ごとの合計勤務時間。
#[derive(Clone, Debug, PartialEq)]
pub struct EmployeeHour {
    pub name: String,
    pub total_hours: f64,
}

/// 勤怠レコードを取得し、従業員ごとの合計勤務時間を計算する。
///
/// 取得に失敗した場合はエラーを返す。途中までの結果は返さない。
///
/// # Arguments
///
/// * `repository` - 勤怠レコードを取得するリポジトリ
pub async fn compute_employee_hours(
    repository: &dyn TimeEntryRepository,
) -> Result<Vec<EmployeeHour>> {
    let time_entries = repository
        .read_time_entries()
        .await
        .context("Failed to retrieve time entries")?;
    let employee_hours = aggregate_employee_hours(&time_entries);
    info!(
        "{} time entries aggregated into {} employees",
        time_entries.len(),
        employee_hours.len()
    );

    Ok(employee_hours)
}

/// 従業員名ごとに勤務時間を合計し、合計時間の降順に並べる。
///
/// 名前は大文字小文字を区別して比較する。合計時間が同じ場合は名前の昇順とする。
pub fn aggregate_employee_hours(time_entries: &[TimeEntry]) -> Vec<EmployeeHour> {
    let totals: HashMap<&str, f64> =
        time_entries
            .iter()
            .fold(HashMap::new(), |mut accumulate, entry| {
                *accumulate.entry(entry.employee_name.as_str()).or_insert(0.0) +=
                    entry.duration_hours();
                accumulate
            });

    let mut employee_hours: Vec<EmployeeHour> = totals
        .into_iter()
        .map(|(name, total_hours)| EmployeeHour {
            name: name.to_string(),
            total_hours,
        })
        .collect();
    employee_hours.sort_by(|a, b| {
        b.total_hours
            .total_cmp(&a.total_hours)
            .then_with(|| a.name.cmp(&b.name))
    });

    employee_hours
}
