//! Visualization output for asv_planner
//!
//! The planner's search can be dumped to a human-readable log file, one
//! line per visualized vertex, and finished missions can be rendered to a
//! PNG with gnuplot.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use gnuplot::{AxesCommon, Caption, Color, Figure};

use crate::common::{PlannerError, PlannerResult, State};
use crate::ribbons::Ribbon;

/// Color palette for consistent styling
pub mod colors {
    pub const OBSTACLE: &str = "#000000";
    pub const START: &str = "#00FF00";
    pub const RIBBON: &str = "#0000FF";
    pub const TRAJECTORY: &str = "#FF0000";
}

/// Writes planner search state to a text log.
///
/// Each line is `tag x y heading time g: G h: H f: F`. Write failures are
/// demoted to debug logs so visualization can never take the planner down.
#[derive(Debug)]
pub struct Visualizer {
    writer: BufWriter<File>,
}

impl Visualizer {
    pub fn create(path: &Path) -> PlannerResult<Self> {
        let file = File::create(path)
            .map_err(|e| PlannerError::Visualization(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    pub fn vertex(&mut self, state: &State, g: f64, h: f64, tag: &str) {
        let line = format!(
            "{} {:.3} {:.3} {:.3} {:.3} g: {:.3} h: {:.3} f: {:.3}",
            tag,
            state.x,
            state.y,
            state.heading,
            state.time,
            g,
            h,
            g + h
        );
        if let Err(e) = writeln!(self.writer, "{}", line) {
            log::debug!("Visualizer write failed: {}", e);
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::debug!("Visualizer flush failed: {}", e);
        }
    }
}

/// Render ribbons and a traversed trajectory to a PNG
pub fn plot_mission(
    output_path: &str,
    ribbons: &[Ribbon],
    trajectory: &[State],
) -> PlannerResult<()> {
    let mut fg = Figure::new();
    {
        let axes = fg
            .axes2d()
            .set_title("Ribbon coverage", &[])
            .set_x_label("X [m]", &[])
            .set_y_label("Y [m]", &[])
            .set_aspect_ratio(gnuplot::AutoOption::Fix(1.0));
        for ribbon in ribbons {
            let (s, e) = (ribbon.start(), ribbon.end());
            axes.lines(
                &[s.x, e.x],
                &[s.y, e.y],
                &[Caption(""), Color(colors::RIBBON)],
            );
        }
        let xs: Vec<f64> = trajectory.iter().map(|s| s.x).collect();
        let ys: Vec<f64> = trajectory.iter().map(|s| s.y).collect();
        axes.lines(&xs, &ys, &[Caption("Trajectory"), Color(colors::TRAJECTORY)]);
        if let Some(first) = trajectory.first() {
            axes.points(&[first.x], &[first.y], &[Caption("Start"), Color(colors::START)]);
        }
    }
    fg.save_to_png(output_path, 800, 600)
        .map_err(|e| PlannerError::Visualization(format!("{:?}", e)))?;
    Ok(())
}
