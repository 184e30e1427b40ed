use std::error::Error;
use std::fmt;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::employee_hours::EmployeeHour;
use crate::glyphs::draw_text;

const WIDTH: u32 = 600;
const HEIGHT: u32 = 600;

/// 円の外接矩形は(100, 100)から400x400。
const CENTER_X: f32 = 300.0;
const CENTER_Y: f32 = 300.0;
const RADIUS: f32 = 200.0;

const LEGEND_X: f32 = 20.0;
const LEGEND_Y: f32 = 20.0;
const LEGEND_LINE_HEIGHT: f32 = 20.0;
const LEGEND_SCALE: f32 = 2.0;

/// 円弧を近似する線分1本あたりの最大角度。
const MAX_SEGMENT_DEGREES: f64 = 1.0;

/// 円グラフを描画できなかった理由。
#[derive(Debug, PartialEq)]
pub enum ChartError {
    /// 従業員が1人もいない。
    NoData,
    /// 合計時間が0以下、または有限でない。
    ZeroTotal,
    Canvas,
    Encode(String),
}

impl fmt::Display for ChartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartError::NoData => f.write_str("no employee hours to chart"),
            ChartError::ZeroTotal => f.write_str("total hours must be positive to chart"),
            ChartError::Canvas => f.write_str("failed to allocate chart canvas"),
            ChartError::Encode(err) => write!(f, "failed to encode chart as PNG: {}", err),
        }
    }
}

impl Error for ChartError {}

/// 円グラフの1区画。角度は度数で、画面座標のx軸正方向から時計回り。
#[derive(Clone, Debug, PartialEq)]
pub struct PieSlice {
    pub name: String,
    pub start_angle: f64,
    pub sweep_angle: f64,
    pub percentage: f64,
}

impl PieSlice {
    /// 凡例に表示する`名前 (割合%)`。割合は小数点以下1桁。
    pub fn label(&self) -> String {
        format!("{} ({:.1}%)", self.name, self.percentage)
    }
}

/// 各従業員の区画を入力の順序で計算する。
///
/// 各区画は直前の区画の終わりから始まる。
pub fn pie_slices(rows: &[EmployeeHour]) -> Result<Vec<PieSlice>, ChartError> {
    if rows.is_empty() {
        return Err(ChartError::NoData);
    }
    let total_hours: f64 = rows.iter().map(|row| row.total_hours).sum();
    if !(total_hours.is_finite() && total_hours > 0.0) {
        return Err(ChartError::ZeroTotal);
    }

    let mut start_angle = 0.0;
    let slices = rows
        .iter()
        .map(|row| {
            let share = row.total_hours / total_hours;
            let sweep_angle = share * 360.0;
            let slice = PieSlice {
                name: row.name.clone(),
                start_angle,
                sweep_angle,
                percentage: share * 100.0,
            };
            start_angle += sweep_angle;
            slice
        })
        .collect();

    Ok(slices)
}

/// 従業員ごとの合計勤務時間の割合を円グラフのPNGとして出力する。
///
/// 区画の色は呼び出しごとにランダムに決まる。
pub fn render_pie_chart(rows: &[EmployeeHour]) -> Result<Vec<u8>, ChartError> {
    let mut rng = StdRng::from_entropy();
    render_pie_chart_with_rng(rows, &mut rng)
}

/// 指定した乱数生成器で色を決めて円グラフを出力する。
pub fn render_pie_chart_with_rng<R: Rng>(
    rows: &[EmployeeHour],
    rng: &mut R,
) -> Result<Vec<u8>, ChartError> {
    let slices = pie_slices(rows)?;

    let mut pixmap = Pixmap::new(WIDTH, HEIGHT).ok_or(ChartError::Canvas)?;
    pixmap.fill(Color::WHITE);

    for slice in &slices {
        let mut paint = Paint::default();
        paint.set_color(random_color(rng));
        paint.anti_alias = true;
        if let Some(path) = slice_path(slice.start_angle, slice.sweep_angle) {
            pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }

    // 凡例は円に重なっても隠れないように最後に描画する
    for (i, slice) in slices.iter().enumerate() {
        draw_text(
            &mut pixmap,
            LEGEND_X,
            LEGEND_Y + i as f32 * LEGEND_LINE_HEIGHT,
            LEGEND_SCALE,
            &slice.label(),
            Color::BLACK,
        );
    }
    debug!("pie chart rendered with {} slices", slices.len());

    pixmap
        .encode_png()
        .map_err(|err| ChartError::Encode(err.to_string()))
}

/// RGBとアルファをそれぞれ50から255の範囲で決める。
fn random_color<R: Rng>(rng: &mut R) -> Color {
    Color::from_rgba8(
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
        rng.gen_range(50..=255),
    )
}

/// 円弧を近似する線分の数。1周を超える角度は1周として扱う。
fn arc_segments(sweep_angle: f64) -> usize {
    ((sweep_angle.abs().min(360.0) / MAX_SEGMENT_DEGREES).ceil() as usize).max(1)
}

/// 中心から始まり円弧を線分で近似した扇形のパスを作る。
///
/// 負の時間を含む場合は1周を超える角度になりうるが、描画されるのは1周分までとする。
fn slice_path(start_angle: f64, sweep_angle: f64) -> Option<tiny_skia::Path> {
    let sweep_angle = sweep_angle.clamp(-360.0, 360.0);
    let steps = arc_segments(sweep_angle);
    let mut builder = PathBuilder::new();
    builder.move_to(CENTER_X, CENTER_Y);
    for step in 0..=steps {
        let angle = (start_angle + sweep_angle * step as f64 / steps as f64).to_radians();
        builder.line_to(
            CENTER_X + RADIUS * angle.cos() as f32,
            CENTER_Y + RADIUS * angle.sin() as f32,
        );
    }
    builder.close();
    builder.finish()
}
