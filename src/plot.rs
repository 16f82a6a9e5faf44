//! Terminal diagnostics
//!
//! ASCII renderings of the two standard diagnostic views: loss curves on a
//! logarithmic scale, and test-set predictions with their confidence band.
//! Meant for quick inspection in a terminal; the text exports carry the
//! full-precision data.

use crate::model::{LossHistory, TrainState};

/// Plot dimensions in characters.
#[derive(Clone, Copy, Debug)]
pub struct PlotConfig {
    pub width: usize,
    pub height: usize,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 72,
            height: 20,
        }
    }
}

struct Grid {
    cells: Vec<Vec<char>>,
    width: usize,
    height: usize,
}

impl Grid {
    fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![vec![' '; width]; height],
            width,
            height,
        }
    }

    /// Mark a point in data coordinates mapped onto the grid. Later marks
    /// win the cell.
    fn mark(&mut self, fx: f32, fy: f32, c: char) {
        if !fx.is_finite() || !fy.is_finite() {
            return;
        }
        let col = (fx * (self.width - 1) as f32).round() as isize;
        let row = ((1.0 - fy) * (self.height - 1) as f32).round() as isize;
        if col >= 0 && (col as usize) < self.width && row >= 0 && (row as usize) < self.height {
            self.cells[row as usize][col as usize] = c;
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for row in &self.cells {
            out.push_str("  │");
            out.extend(row.iter());
            out.push('\n');
        }
        out.push_str("  └");
        out.push_str(&"─".repeat(self.width));
        out.push('\n');
        out
    }
}

fn span(values: impl Iterator<Item = f32>) -> Option<(f32, f32)> {
    let mut lo = f32::INFINITY;
    let mut hi = f32::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if lo > hi {
        return None;
    }
    if lo == hi {
        // Degenerate span: pad so a flat series still renders mid-grid
        return Some((lo - 0.5, hi + 0.5));
    }
    Some((lo, hi))
}

fn log10_clamped(v: f32) -> f32 {
    v.max(1e-30).log10()
}

/// Render train/test loss totals over steps on a log10 scale:
/// `o` train, `x` test, `*` both in one cell.
pub fn loss_curves(history: &LossHistory, config: &PlotConfig) -> String {
    let mut out = String::new();
    out.push_str(&"═".repeat(config.width + 4));
    out.push('\n');
    out.push_str("  LOSS HISTORY  (log10 loss vs step; o train, x test)\n");
    out.push_str(&"─".repeat(config.width + 4));
    out.push('\n');

    if history.is_empty() {
        out.push_str("  (no records)\n");
        return out;
    }

    let train = history.train_totals();
    let test = history.test_totals();
    let steps = &history.steps;

    let (s_lo, s_hi) = span(steps.iter().map(|&s| s as f32)).unwrap_or((0.0, 1.0));
    let (l_lo, l_hi) = span(
        train
            .iter()
            .chain(test.iter())
            .map(|&v| log10_clamped(v)),
    )
    .unwrap_or((-1.0, 1.0));

    let mut grid = Grid::new(config.width, config.height);
    let norm_x = |s: f32| (s - s_lo) / (s_hi - s_lo).max(1e-12);
    let norm_y = |l: f32| (l - l_lo) / (l_hi - l_lo).max(1e-12);

    for (&step, &value) in steps.iter().zip(train.iter()) {
        grid.mark(norm_x(step as f32), norm_y(log10_clamped(value)), 'o');
    }
    for (&step, &value) in steps.iter().zip(test.iter()) {
        let fx = norm_x(step as f32);
        let fy = norm_y(log10_clamped(value));
        let col = (fx * (config.width - 1) as f32).round() as usize;
        let row = ((1.0 - fy) * (config.height - 1) as f32).round() as usize;
        let taken = grid
            .cells
            .get(row)
            .and_then(|r| r.get(col))
            .is_some_and(|&c| c == 'o');
        grid.mark(fx, fy, if taken { '*' } else { 'x' });
    }

    out.push_str(&grid.render());
    out.push_str(&format!(
        "  step {:.0}..{:.0}   log10 loss {:.2}..{:.2}\n",
        s_lo, s_hi, l_lo, l_hi
    ));
    out
}

/// Render the held-out targets (`o`), the best prediction (`x`), and the
/// ±2σ band (`.`) against the first input column.
pub fn prediction_bands(state: &TrainState, config: &PlotConfig) -> String {
    let mut out = String::new();
    out.push_str(&"═".repeat(config.width + 4));
    out.push('\n');
    out.push_str("  PREDICTION  (o true, x prediction, . 95% band)\n");
    out.push_str(&"─".repeat(config.width + 4));
    out.push('\n');

    let (x_test, y_test, best_y) = match (&state.x_test, &state.y_test, &state.best_y) {
        (Some(x), Some(y), Some(b)) => (x, y.merged(), b.merged()),
        _ => {
            out.push_str("  (no best result recorded)\n");
            return out;
        }
    };
    let band = state.best_ystd.as_ref().map(|s| s.merged());

    let xs: Vec<f32> = x_test.column(0).to_vec();
    let (x_lo, x_hi) = match span(xs.iter().copied()) {
        Some(s) => s,
        None => {
            out.push_str("  (no finite inputs)\n");
            return out;
        }
    };

    let mut y_values: Vec<f32> = y_test.iter().chain(best_y.iter()).copied().collect();
    if let Some(std) = &band {
        for (&y, &s) in best_y.iter().zip(std.iter()) {
            y_values.push(y + 2.0 * s);
            y_values.push(y - 2.0 * s);
        }
    }
    let (y_lo, y_hi) = span(y_values.into_iter()).unwrap_or((-1.0, 1.0));

    let mut grid = Grid::new(config.width, config.height);
    let norm_x = |x: f32| (x - x_lo) / (x_hi - x_lo).max(1e-12);
    let norm_y = |y: f32| (y - y_lo) / (y_hi - y_lo).max(1e-12);

    for col in 0..best_y.ncols() {
        if let Some(std) = &band {
            for (i, &x) in xs.iter().enumerate() {
                let y = best_y[[i, col]];
                let s = std[[i, col]];
                grid.mark(norm_x(x), norm_y(y + 2.0 * s), '.');
                grid.mark(norm_x(x), norm_y(y - 2.0 * s), '.');
            }
        }
        for (i, &x) in xs.iter().enumerate() {
            grid.mark(norm_x(x), norm_y(y_test[[i, col]]), 'o');
        }
        for (i, &x) in xs.iter().enumerate() {
            grid.mark(norm_x(x), norm_y(best_y[[i, col]]), 'x');
        }
    }

    out.push_str(&grid.render());
    out.push_str(&format!(
        "  x {:.3}..{:.3}   y {:.3}..{:.3}\n",
        x_lo, x_hi, y_lo, y_hi
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Values;
    use ndarray::array;

    #[test]
    fn loss_curves_renders_records() {
        let mut history = LossHistory::new();
        history.add(0, vec![1.0], vec![2.0], vec![]);
        history.add(10, vec![0.1], vec![0.2], vec![]);
        history.add(20, vec![0.01], vec![0.02], vec![]);

        let text = loss_curves(&history, &PlotConfig::default());
        assert!(text.contains("LOSS HISTORY"));
        assert!(text.contains('o'));
        assert!(text.contains("log10 loss"));
    }

    #[test]
    fn loss_curves_handles_empty_history() {
        let text = loss_curves(&LossHistory::new(), &PlotConfig::default());
        assert!(text.contains("(no records)"));
    }

    #[test]
    fn prediction_bands_draws_band_when_std_present() {
        let mut state = TrainState::new();
        state.update_data_test(
            array![[0.0], [0.5], [1.0]],
            Values::Single(array![[0.0], [0.5], [1.0]]),
        );
        state.loss_train = vec![0.1];
        state.loss_test = vec![0.2];
        state.y_pred_test = Some(Values::Single(array![[0.1], [0.4], [0.9]]));
        state.y_std_test = Some(Values::Single(array![[0.2], [0.2], [0.2]]));
        state.update_best();

        let text = prediction_bands(&state, &PlotConfig::default());
        assert!(text.contains("PREDICTION"));
        assert!(text.contains('.'));
        assert!(text.contains('x'));
    }

    #[test]
    fn prediction_bands_without_best_result_degrades_gracefully() {
        let text = prediction_bands(&TrainState::new(), &PlotConfig::default());
        assert!(text.contains("(no best result recorded)"));
    }
}
