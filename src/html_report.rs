use crate::employee_hours::EmployeeHour;

/// この時間未満の従業員は強調表示する。
pub const LOW_HOURS_THRESHOLD: f64 = 100.0;

/// 円グラフを返すエンドポイントのパス。
pub const PIE_CHART_PATH: &str = "/report/piechart";

const STYLE: &str = "table { border-collapse: collapse; width: 60%; margin: 20px auto; }\
th, td { border: 1px solid #ccc; padding: 8px; text-align: left; }\
tr.low-hours { background-color: #ffcccc; }";

/// 従業員ごとの合計勤務時間をHTMLの表として出力する。
///
/// 合計時間は小数点以下2桁で表示する。円グラフは画像として別途取得させる。
///
/// # Arguments
///
/// * `rows` - 表示する従業員ごとの合計勤務時間
pub fn render_html_report(rows: &[EmployeeHour]) -> String {
    let mut html = String::new();
    html.push_str("<html><head><meta charset=\"utf-8\"><style>");
    html.push_str(STYLE);
    html.push_str("</style></head><body>");
    html.push_str("<h2 style='text-align:center'>Employee Work Hours</h2>");
    html.push_str("<table><tr><th>Name</th><th>Total Hours</th></tr>");

    for row in rows {
        let row_class = if row.total_hours < LOW_HOURS_THRESHOLD {
            " class='low-hours'"
        } else {
            ""
        };
        html.push_str(&format!(
            "<tr{}><td>{}</td><td>{:.2}</td></tr>",
            row_class,
            escape_html(&row.name),
            row.total_hours
        ));
    }

    html.push_str("</table>");
    html.push_str("<h2>Employee Work Distribution (Pie Chart)</h2>");
    html.push_str(&format!(
        "<img src=\"{}\" alt=\"Pie Chart\" />",
        PIE_CHART_PATH
    ));
    html.push_str("</body></html>");

    html
}

fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
