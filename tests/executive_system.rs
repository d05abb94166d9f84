//! System tests: the executive driven by a stub host node

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use log::{LevelFilter, Log, Metadata, Record};

use asv_planner::common::State;
use asv_planner::dubins::DubinsPlan;
use asv_planner::executive::{Executive, PlannerState, TrajectoryPublisher, PLANNING_TIME_SECONDS};
use asv_planner::planner::config::system_clock;
use asv_planner::ribbons::RibbonManager;

/// Host-node stub: a perfect controller unless an offset is configured
struct NodeStub {
    trajectory: Mutex<Vec<State>>,
    publish_count: AtomicUsize,
    done: AtomicBool,
    /// Added to the x the controller reports, to fake disagreement
    start_state_offset_x: f64,
}

impl NodeStub {
    fn new() -> Self {
        Self::with_offset(0.0)
    }

    fn with_offset(offset_x: f64) -> Self {
        Self {
            trajectory: Mutex::new(Vec::new()),
            publish_count: AtomicUsize::new(0),
            done: AtomicBool::new(false),
            start_state_offset_x: offset_x,
        }
    }

    fn all_done_called(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    fn last_trajectory(&self) -> Vec<State> {
        self.trajectory.lock().unwrap().clone()
    }

    fn publish_count(&self) -> usize {
        self.publish_count.load(Ordering::SeqCst)
    }
}

impl TrajectoryPublisher for NodeStub {
    fn get_time(&self) -> f64 {
        system_clock()
    }

    fn publish_plan(&self, plan: &DubinsPlan) -> State {
        self.publish_count.fetch_add(1, Ordering::SeqCst);
        let mut state = State {
            time: (plan.start_time() + PLANNING_TIME_SECONDS).min(plan.end_time()),
            ..State::default()
        };
        plan.sample(&mut state);
        state.x += self.start_state_offset_x;
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

/// Collects every log line so tests can assert on operator-visible messages
struct CaptureLogger {
    lines: Mutex<Vec<String>>,
}

impl CaptureLogger {
    fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.lines.lock().unwrap().push(format!("{}", record.args()));
    }

    fn flush(&self) {}
}

fn capture_logs() -> &'static CaptureLogger {
    static CAPTURE: OnceLock<&'static CaptureLogger> = OnceLock::new();
    CAPTURE.get_or_init(|| {
        let logger: &'static CaptureLogger = Box::leak(Box::new(CaptureLogger {
            lines: Mutex::new(Vec::new()),
        }));
        let _ = log::set_logger(logger);
        log::set_max_level(LevelFilter::Debug);
        logger
    })
}

fn wait_for<F: Fn() -> bool>(deadline: Duration, condition: F) -> bool {
    let begin = Instant::now();
    while begin.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn empty_mission_signals_all_done_immediately() {
    let stub = Arc::new(NodeStub::new());
    let executive = Executive::new(stub.clone());
    executive.update_covered(0.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();
    assert!(wait_for(Duration::from_secs_f64(2.0 * PLANNING_TIME_SECONDS), || {
        stub.all_done_called()
    }));
    executive.terminate();
    assert_eq!(executive.planner_state(), PlannerState::Inactive);
}

#[test]
fn single_straight_ribbon_gets_covered() {
    let stub = Arc::new(NodeStub::new());
    let executive = Executive::new(stub.clone());
    executive.add_ribbon(0.0, 0.0, 50.0, 0.0);
    // approach from off the ribbon so the sweep crosses its near end
    executive.update_covered(-10.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();
    for _ in 0..120 {
        if stub.all_done_called() {
            break;
        }
        // feed back a couple of samples per cycle, the way a live telemetry
        // stream would report positions along the executed trajectory
        let trajectory = stub.last_trajectory();
        for along in trajectory.iter().skip(1).take(2) {
            executive.update_covered(
                along.x,
                along.y,
                along.speed,
                along.heading,
                Executive::current_time(),
            );
        }
        thread::sleep(Duration::from_millis(500));
    }
    assert!(stub.all_done_called());
    executive.terminate();
}

#[test]
fn box_pattern_gets_covered() {
    let stub = Arc::new(NodeStub::new());
    let executive = Executive::new(stub.clone());
    // tighter turns than the default so the turnarounds fit the pattern
    executive.set_configuration(4.0, 8.0, 2.5, 2.0, 4, 2);
    executive.add_ribbon(10.0, 10.0, 20.0, 10.0);
    executive.add_ribbon(20.0, 10.0, 20.0, 20.0);
    executive.add_ribbon(20.0, 20.0, 10.0, 20.0);
    executive.add_ribbon(10.0, 20.0, 10.0, 10.0);
    executive.update_covered(0.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();
    for _ in 0..120 {
        if stub.all_done_called() {
            break;
        }
        let trajectory = stub.last_trajectory();
        for along in trajectory.iter().skip(1).take(2) {
            executive.update_covered(
                along.x,
                along.y,
                along.speed,
                along.heading,
                Executive::current_time(),
            );
        }
        thread::sleep(Duration::from_millis(500));
    }
    assert!(stub.all_done_called());
    executive.terminate();
}

#[test]
fn cancellation_reaches_inactive_within_grace() {
    let stub = Arc::new(NodeStub::new());
    let executive = Executive::new(stub.clone());
    executive.add_ribbon(10.0, 10.0, 40.0, 10.0);
    executive.update_covered(0.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();
    assert!(wait_for(Duration::from_secs(2), || executive.planner_is_running()));
    executive.cancel_planner();
    assert!(wait_for(
        Duration::from_secs_f64(2.0 * PLANNING_TIME_SECONDS),
        || executive.planner_state() == PlannerState::Inactive
    ));
    // dropping after cancellation must not deadlock
    drop(executive);
}

#[test]
fn bad_map_path_does_not_stop_the_planner() {
    let logs = capture_logs();
    let stub = Arc::new(NodeStub::new());
    let executive = Executive::new(stub.clone());
    executive.add_ribbon(10.0, 0.0, 30.0, 0.0);
    executive.update_covered(0.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();
    assert!(wait_for(Duration::from_secs(2), || executive.planner_is_running()));
    executive.refresh_map("nonexistent.tiff", 0.0, 0.0);
    assert!(wait_for(Duration::from_secs(5), || {
        logs.contains("Encountered an error loading map at path nonexistent.tiff")
    }));
    // planner survived the failed load and is still cycling
    assert!(executive.planner_is_running());
    executive.terminate();
    assert_eq!(executive.planner_state(), PlannerState::Inactive);
}

#[test]
fn controller_disagreement_drops_plan_and_replans() {
    let stub = Arc::new(NodeStub::with_offset(10.0));
    let executive = Executive::new(stub.clone());
    executive.add_ribbon(5.0, 0.0, 45.0, 0.0);
    executive.update_covered(0.0, 0.0, 2.5, 0.0, Executive::current_time());
    executive.start_planner();
    // every publish disagrees by 10 m in x, so each cycle drops its plan
    // and replans from scratch; the planner must keep publishing anyway
    assert!(wait_for(Duration::from_secs(8), || stub.publish_count() >= 2));
    assert!(executive.planner_is_running());
    executive.terminate();
}
