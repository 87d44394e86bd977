//! Multi-scale template matching
//!
//! Scores are correlation coefficients (zero-mean normalized cross
//! correlation) computed from exact integer sums: window sums and squares
//! come from integral images, the cross term from a direct u8 x u8 product
//! sum. Large searches run coarse to fine over a 2x box pyramid and only the
//! final full-resolution score is ever reported.
use super::template::IconTemplate;
use super::types::MatchResult;
use crate::error::{AutomationError, AutomationResult};
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use std::borrow::Cow;

/// Searches costing at most this many pixel products are scored exhaustively
const EXHAUSTIVE_BUDGET: u64 = 1 << 22;
/// Pyramid depth limit (coarsest level is 1/8 scale)
const MAX_PYRAMID_LEVELS: u32 = 3;
/// The template's short side must stay at least this long at the coarsest level
const MIN_COARSE_SIDE: u32 = 10;
/// Coarse peaks carried down to full resolution
const MAX_CANDIDATES: usize = 16;
/// Search radius around each upsampled candidate, per level
const REFINE_RADIUS: u32 = 2;

pub type ScoreSurface = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Anything that can look for one icon in one grayscale frame.
///
/// The coordinator only depends on this trait, so tests can swap in matchers
/// with controlled timing or failures.
pub trait IconMatcher: Send + Sync {
    fn match_icon(
        &self,
        template: &IconTemplate,
        frame: &GrayImage,
    ) -> AutomationResult<Option<MatchResult>>;
}

/// Scale factors for a closed range, generated by step count so the upper
/// bound survives floating-point drift (0.8, 0.9, 1.0 rather than 0.8, 0.9).
pub fn scale_factors(low: f32, high: f32, step: f32) -> Vec<f32> {
    if step <= 0.0 || low > high {
        return Vec::new();
    }
    let steps = ((high - low) / step + 1e-4).floor() as usize;
    (0..=steps)
        .map(|i| {
            let scale = low + step * i as f32;
            (scale * 1000.0).round() / 1000.0
        })
        .collect()
}

/// Result of walking the scale list for one icon
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleSearch {
    pub best: Option<MatchResult>,
    /// How many scales were actually matched before stopping
    pub scales_tried: usize,
    /// Window positions scored across all scales and pyramid levels
    pub windows_scored: u64,
}

/// Searches a fixed list of scales and stops at the first one whose best
/// location clears the threshold.
#[derive(Debug, Clone)]
pub struct ScaleMatcher {
    threshold: f32,
    scales: Vec<f32>,
}

impl ScaleMatcher {
    pub fn new(threshold: f32, scales: Vec<f32>) -> Self {
        Self { threshold, scales }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn scales(&self) -> &[f32] {
        &self.scales
    }

    /// Walk the scales in order; the first scale that clears the threshold wins.
    pub fn search(
        &self,
        template: &IconTemplate,
        frame: &GrayImage,
    ) -> AutomationResult<ScaleSearch> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(AutomationError::EmptyFrame {
                width: frame.width(),
                height: frame.height(),
            });
        }

        let mut scales_tried = 0;
        let mut windows_scored = 0;
        for &scale in &self.scales {
            let Some(scaled) = scale_template(template.pixels(), scale) else {
                log::debug!(
                    "⚠️ Icon '{}' at scale {:.1} collapses to zero size, skipped",
                    template.name,
                    scale
                );
                continue;
            };
            if scaled.width() > frame.width() || scaled.height() > frame.height() {
                log::debug!(
                    "⚠️ Icon '{}' at scale {:.1} is larger than the frame: {}x{} > {}x{}",
                    template.name,
                    scale,
                    scaled.width(),
                    scaled.height(),
                    frame.width(),
                    frame.height()
                );
                continue;
            }

            scales_tried += 1;
            let located = best_location(frame, &scaled);
            windows_scored += located.windows_scored;
            let (x, y, score) = (located.x, located.y, located.score);
            log::debug!(
                "🔍 Icon '{}' scale {:.1}: best {:.3} at ({},{}), {} windows",
                template.name,
                scale,
                score,
                x,
                y,
                located.windows_scored
            );

            if score >= self.threshold {
                return Ok(ScaleSearch {
                    best: Some(MatchResult {
                        icon: template.id,
                        x,
                        y,
                        width: scaled.width(),
                        height: scaled.height(),
                        confidence: score,
                        scale,
                    }),
                    scales_tried,
                    windows_scored,
                });
            }
        }

        Ok(ScaleSearch {
            best: None,
            scales_tried,
            windows_scored,
        })
    }
}

impl IconMatcher for ScaleMatcher {
    fn match_icon(
        &self,
        template: &IconTemplate,
        frame: &GrayImage,
    ) -> AutomationResult<Option<MatchResult>> {
        self.search(template, frame).map(|search| search.best)
    }
}

/// Resize with linear resampling; scale 1.0 keeps the original pixels.
fn scale_template(template: &GrayImage, scale: f32) -> Option<GrayImage> {
    if (scale - 1.0).abs() <= 0.01 {
        return Some(template.clone());
    }
    let new_width = (template.width() as f32 * scale).round() as u32;
    let new_height = (template.height() as f32 * scale).round() as u32;
    if new_width == 0 || new_height == 0 {
        return None;
    }
    Some(imageops::resize(
        template,
        new_width,
        new_height,
        FilterType::Triangle,
    ))
}

/// Exact sums of a template, shared by every window it is scored against
struct TemplateStats<'a> {
    pixels: &'a GrayImage,
    n: i64,
    sum: i64,
    /// n * sum(T^2) - sum(T)^2, i.e. n times the centered sum of squares
    spread: i64,
    flat: bool,
}

impl<'a> TemplateStats<'a> {
    fn new(pixels: &'a GrayImage) -> Self {
        let n = i64::from(pixels.width()) * i64::from(pixels.height());
        let (sum, sum_sq) = pixels.pixels().fold((0i64, 0i64), |(s, sq), p| {
            let v = i64::from(p[0]);
            (s + v, sq + v * v)
        });
        let spread = n * sum_sq - sum * sum;
        let flat = n == 0 || is_flat(spread as f64, n as f64, sum_sq as f64);
        Self {
            pixels,
            n,
            sum,
            spread,
            flat,
        }
    }

    fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    /// Correlation coefficient for a window with the given sums.
    ///
    /// `cross` is only evaluated when neither side is flat.
    fn score(&self, w_sum: u64, w_sq: u64, cross: impl FnOnce() -> u64) -> f32 {
        if self.flat {
            return 0.0;
        }
        let n = i128::from(self.n);
        let (w_sum, w_sq) = (i128::from(w_sum), i128::from(w_sq));
        let w_spread = n * w_sq - w_sum * w_sum;
        if is_flat(w_spread as f64, self.n as f64, w_sq as f64) {
            return 0.0;
        }
        let numerator = n * i128::from(cross()) - i128::from(self.sum) * w_sum;
        let score = numerator as f64 / (self.spread as f64 * w_spread as f64).sqrt();
        score.clamp(-1.0, 1.0) as f32
    }
}

/// Relative floor on the centered sum of squares, as OpenCV applies before
/// dividing: patches at or below it count as flat.
fn variance_floor(sum_sq: f64) -> f64 {
    (10.0 * f64::from(f32::EPSILON) * sum_sq).max(0.5)
}

/// `spread` is n times the centered sum of squares, `sum_sq` the raw one.
fn is_flat(spread: f64, n: f64, sum_sq: f64) -> bool {
    spread / n <= variance_floor(sum_sq)
}

/// sum(T * I) over the window whose top-left corner is (x, y)
fn cross_sum(frame: &GrayImage, template: &GrayImage, x: u32, y: u32) -> u64 {
    let fw = frame.width() as usize;
    let tw = template.width() as usize;
    let raw = frame.as_raw();
    let mut total = 0u64;
    for (ty, t_row) in template.as_raw().chunks_exact(tw).enumerate() {
        let start = (y as usize + ty) * fw + x as usize;
        // 255 * 255 * width stays below u32::MAX for any screen width
        let row: u32 = raw[start..start + tw]
            .iter()
            .zip(t_row)
            .map(|(&a, &b)| u32::from(a) * u32::from(b))
            .sum();
        total += u64::from(row);
    }
    total
}

/// sum(I) and sum(I^2) over one window, without integral images
fn window_moments(frame: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> (u64, u64) {
    let fw = frame.width() as usize;
    let raw = frame.as_raw();
    let mut sum = 0u64;
    let mut sum_sq = 0u64;
    for row in y..y + h {
        let start = row as usize * fw + x as usize;
        for &v in &raw[start..start + w as usize] {
            let v = u64::from(v);
            sum += v;
            sum_sq += v * v;
        }
    }
    (sum, sum_sq)
}

/// Correlation-coefficient score at every position of `template` over `frame`.
///
/// Flat windows (or a flat template) score 0. Returns an empty surface when
/// the template does not fit.
pub fn correlation_surface(frame: &GrayImage, template: &GrayImage) -> ScoreSurface {
    surface_for(frame, &TemplateStats::new(template))
}

fn surface_for(frame: &GrayImage, stats: &TemplateStats) -> ScoreSurface {
    let (tw, th) = stats.dimensions();
    if tw == 0 || th == 0 || tw > frame.width() || th > frame.height() {
        return ImageBuffer::new(0, 0);
    }
    let sums = integral_image::<_, u64>(frame);
    let squares = integral_squared_image::<_, u64>(frame);

    let (out_w, out_h) = (frame.width() - tw + 1, frame.height() - th + 1);
    ImageBuffer::from_fn(out_w, out_h, |x, y| {
        let w_sum = window_sum(&sums, x, y, tw, th);
        let w_sq = window_sum(&squares, x, y, tw, th);
        Luma([stats.score(w_sum, w_sq, || cross_sum(frame, stats.pixels, x, y))])
    })
}

/// Highest score on a surface; ties keep the first in row-major order.
fn surface_peak(surface: &ScoreSurface) -> (u32, u32, f32) {
    let mut best = (0, 0, f32::MIN);
    for (x, y, pixel) in surface.enumerate_pixels() {
        if pixel[0] > best.2 {
            best = (x, y, pixel[0]);
        }
    }
    best
}

/// Best full-resolution position for one scaled template
struct Located {
    x: u32,
    y: u32,
    score: f32,
    windows_scored: u64,
}

/// Upper bound on 2x levels for this search; 0 means exhaustive.
fn pyramid_levels(frame: &GrayImage, template: &GrayImage) -> u32 {
    let (tw, th) = template.dimensions();
    let positions = u64::from(frame.width() - tw + 1) * u64::from(frame.height() - th + 1);
    if positions * u64::from(tw) * u64::from(th) <= EXHAUSTIVE_BUDGET {
        return 0;
    }
    let short_side = tw.min(th);
    let mut levels = 0;
    while levels < MAX_PYRAMID_LEVELS && short_side >> (levels + 1) >= MIN_COARSE_SIDE {
        levels += 1;
    }
    levels
}

/// Halve both dimensions, averaging each 2x2 block.
fn downsample(image: &GrayImage) -> GrayImage {
    GrayImage::from_fn(image.width() / 2, image.height() / 2, |x, y| {
        let (sx, sy) = (x * 2, y * 2);
        let total: u16 = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .iter()
            .map(|&(dx, dy)| u16::from(image.get_pixel(sx + dx, sy + dy)[0]))
            .sum();
        Luma([((total + 2) / 4) as u8])
    })
}

/// Best position of the template; the template must fit inside the frame.
fn best_location(frame: &GrayImage, template: &GrayImage) -> Located {
    let mut frames: Vec<Cow<'_, GrayImage>> = vec![Cow::Borrowed(frame)];
    let mut templates: Vec<Cow<'_, GrayImage>> = vec![Cow::Borrowed(template)];
    for level in 0..pyramid_levels(frame, template) as usize {
        // Fine texture that averages out to flat cannot be searched coarsely
        let coarse_template = downsample(&templates[level]);
        if TemplateStats::new(&coarse_template).flat {
            break;
        }
        let coarse_frame = downsample(&frames[level]);
        frames.push(Cow::Owned(coarse_frame));
        templates.push(Cow::Owned(coarse_template));
    }
    let stats: Vec<TemplateStats> = templates.iter().map(|t| TemplateStats::new(t)).collect();

    let top = stats.len() - 1;
    let surface = surface_for(&frames[top], &stats[top]);
    let mut windows_scored = u64::from(surface.width()) * u64::from(surface.height());
    if top == 0 {
        let (x, y, score) = surface_peak(&surface);
        return Located {
            x,
            y,
            score,
            windows_scored,
        };
    }

    let (ctw, cth) = stats[top].dimensions();
    let seeds = peak_candidates(&surface, (ctw.max(cth) / 2).max(1), MAX_CANDIDATES);
    let mut best = (0, 0, f32::MIN);
    for (seed_x, seed_y) in seeds {
        let (x, y, score) =
            (0..top)
                .rev()
                .fold((seed_x, seed_y, f32::MIN), |(x, y, _), level| {
                    refine(&frames[level], &stats[level], x * 2, y * 2, &mut windows_scored)
                });
        if score > best.2 || (score == best.2 && (y, x) < (best.1, best.0)) {
            best = (x, y, score);
        }
    }

    Located {
        x: best.0,
        y: best.1,
        score: best.2,
        windows_scored,
    }
}

/// Up to `limit` highest-scoring positions at least `radius` apart.
fn peak_candidates(surface: &ScoreSurface, radius: u32, limit: usize) -> Vec<(u32, u32)> {
    let mut ranked: Vec<(u32, u32, f32)> = surface
        .enumerate_pixels()
        .map(|(x, y, p)| (x, y, p[0]))
        .collect();
    // Stable sort: equal scores stay in row-major order
    ranked.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut picked: Vec<(u32, u32)> = Vec::with_capacity(limit);
    for (x, y, _) in ranked {
        if picked.len() == limit {
            break;
        }
        if picked
            .iter()
            .all(|&(px, py)| x.abs_diff(px) > radius || y.abs_diff(py) > radius)
        {
            picked.push((x, y));
        }
    }
    picked
}

/// Score the neighbourhood of (cx, cy) and return its best position.
fn refine(
    frame: &GrayImage,
    stats: &TemplateStats,
    cx: u32,
    cy: u32,
    windows_scored: &mut u64,
) -> (u32, u32, f32) {
    let (tw, th) = stats.dimensions();
    let max_x = frame.width() - tw;
    let max_y = frame.height() - th;
    let x_lo = cx.saturating_sub(REFINE_RADIUS).min(max_x);
    let x_hi = (cx + REFINE_RADIUS).min(max_x);
    let y_lo = cy.saturating_sub(REFINE_RADIUS).min(max_y);
    let y_hi = (cy + REFINE_RADIUS).min(max_y);

    let mut best = (x_lo, y_lo, f32::MIN);
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let (w_sum, w_sq) = window_moments(frame, x, y, tw, th);
            let score = stats.score(w_sum, w_sq, || cross_sum(frame, stats.pixels, x, y));
            *windows_scored += 1;
            if score > best.2 {
                best = (x, y, score);
            }
        }
    }
    best
}

/// Sum over the `w`x`h` window at (x, y) from a zero-padded integral image.
fn window_sum(
    integral: &ImageBuffer<Luma<u64>, Vec<u64>>,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> u64 {
    let a = integral.get_pixel(x, y)[0];
    let b = integral.get_pixel(x + w, y)[0];
    let c = integral.get_pixel(x, y + h)[0];
    let d = integral.get_pixel(x + w, y + h)[0];
    d + a - b - c
}
