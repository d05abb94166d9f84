// Ribbon coverage demo: run the executive against a stub controller on a
// small box mission and render the traversed trajectory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use asv_planner::common::State;
use asv_planner::dubins::DubinsPlan;
use asv_planner::executive::{Executive, TrajectoryPublisher, PLANNING_TIME_SECONDS};
use asv_planner::planner::config::system_clock;
use asv_planner::ribbons::{Ribbon, RibbonManager, DEFAULT_RIBBON_WIDTH};
use asv_planner::utils::visualization::plot_mission;

/// Stands in for the host node: executes plans perfectly and records what
/// it was shown.
struct DemoPublisher {
    trajectory: Mutex<Vec<State>>,
    done: AtomicBool,
}

impl DemoPublisher {
    fn new() -> Self {
        Self {
            trajectory: Mutex::new(Vec::new()),
            done: AtomicBool::new(false),
        }
    }

    fn latest_trajectory(&self) -> Vec<State> {
        self.trajectory.lock().unwrap().clone()
    }

    fn all_done_called(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

impl TrajectoryPublisher for DemoPublisher {
    fn get_time(&self) -> f64 {
        system_clock()
    }

    fn publish_plan(&self, plan: &DubinsPlan) -> State {
        // a perfect controller: report the state we will occupy when the
        // next planning cycle completes
        let mut state = State {
            time: (plan.start_time() + PLANNING_TIME_SECONDS).min(plan.end_time()),
            ..State::default()
        };
        plan.sample(&mut state);
        state
    }

    fn display_trajectory(&self, samples: &[State], is_plan: bool) {
        if is_plan && !samples.is_empty() {
            *self.trajectory.lock().unwrap() = samples.to_vec();
        }
    }

    fn display_ribbons(&self, _ribbons: &RibbonManager) {}

    fn all_done(&self) {
        self.done.store(true, Ordering::SeqCst);
    }
}

fn main() {
    env_logger::init();
    println!("Ribbon coverage demo start!!");

    let corners = [
        (10.0, 10.0, 20.0, 10.0),
        (20.0, 10.0, 20.0, 20.0),
        (20.0, 20.0, 10.0, 20.0),
        (10.0, 20.0, 10.0, 10.0),
    ];

    let publisher = Arc::new(DemoPublisher::new());
    let executive = Executive::new(publisher.clone());
    for (x1, y1, x2, y2) in corners {
        executive.add_ribbon(x1, y1, x2, y2);
    }
    executive.update_covered(0.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();

    let mut traversed: Vec<State> = Vec::new();
    for _ in 0..120 {
        if publisher.all_done_called() {
            break;
        }
        // pretend the vehicle tracked the plan perfectly
        let trajectory = publisher.latest_trajectory();
        for along in trajectory.iter().skip(1).take(2) {
            executive.update_covered(
                along.x,
                along.y,
                along.speed,
                along.heading,
                Executive::current_time(),
            );
            traversed.push(*along);
        }
        thread::sleep(Duration::from_millis(500));
    }

    executive.terminate();

    if publisher.all_done_called() {
        println!("Mission complete: all ribbons covered.");
    } else {
        println!("Mission did not finish within the demo budget.");
    }

    let ribbons: Vec<Ribbon> = corners
        .iter()
        .map(|&(x1, y1, x2, y2)| Ribbon::new(x1, y1, x2, y2, DEFAULT_RIBBON_WIDTH))
        .collect();
    let output = "coverage_demo_result.png";
    match plot_mission(output, &ribbons, &traversed) {
        Ok(()) => println!("Plot saved to: {}", output),
        Err(e) => println!("Plotting skipped: {}", e),
    }

    println!("Ribbon coverage demo finish!!");
}
