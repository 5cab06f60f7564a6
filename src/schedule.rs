extern crate nix;
extern crate std;

use crate::clock;
use crate::config;
use crate::drawing;
use crate::fetch;
use crate::mbta;
use crate::result;

pub trait Restarter {
    fn restart(&mut self);
}

// Replaces the running process with a fresh copy of itself. If exec fails we
// exit non-zero and leave it to the supervisor.
pub struct ExecRestarter;

impl ExecRestarter {
    fn exec_self() -> result::DashResult<()> {
        use std::os::unix::ffi::OsStrExt;

        let exe = std::env::current_exe()?;
        let path = std::ffi::CString::new(exe.as_os_str().as_bytes())
            .map_err(|e| result::make_error(&format!("bad executable path: {}", e)))?;

        let mut args = vec![];
        for arg in std::env::args_os() {
            args.push(std::ffi::CString::new(arg.as_bytes())
                      .map_err(|e| result::make_error(&format!("bad argument: {}", e)))?);
        }

        if let Err(err) = nix::unistd::execv(&path, &args) {
            return Err(result::make_error(&format!("execv failed: {}", err)));
        }
        return Ok(());
    }
}

impl Restarter for ExecRestarter {
    fn restart(&mut self) {
        error!("Restarting");
        log::logger().flush();
        if let Err(err) = ExecRestarter::exec_self() {
            error!("Couldn't restart in place, exiting: {}", err);
        }
        std::process::exit(1);
    }
}

// Everything that survives from one cycle to the next.
pub struct ScheduleLoop {
    stations: Vec<config::Station>,
    poll_interval: std::time::Duration,
    failure_threshold: u32,
    station_index: usize,
    failure_count: u32,
}

impl ScheduleLoop {
    pub fn new(config: &config::Config) -> ScheduleLoop {
        return ScheduleLoop{
            stations: config.stations.clone(),
            poll_interval: std::time::Duration::from_secs(config.poll_interval_secs),
            failure_threshold: config.failure_threshold,
            station_index: 0,
            failure_count: 0,
        };
    }

    pub fn station_index(&self) -> usize {
        return self.station_index;
    }

    pub fn failure_count(&self) -> u32 {
        return self.failure_count;
    }

    pub fn current_station(&self) -> &config::Station {
        return &self.stations[self.station_index % self.stations.len()];
    }

    fn one_iteration(&self, fetcher: &dyn fetch::Fetcher, clock: &dyn clock::Clock, renderer: &mut dyn drawing::Render) -> result::DashResult<()> {
        let station = self.current_station();
        let now = clock.now();
        let arrivals = mbta::poll(fetcher, station, &now);
        let state = drawing::DisplayState::compose(&station.name, &now, &arrivals);
        info!("{} {} | {} | {}", state.station_name, state.time, state.train1, state.train2);
        renderer.render(&state)?;
        return Ok(());
    }

    // Polls and draws the current station, then moves on to the next one.
    // Errors never escape: they count towards a restart instead.
    pub fn cycle(&mut self, fetcher: &dyn fetch::Fetcher, clock: &dyn clock::Clock, renderer: &mut dyn drawing::Render, restarter: &mut dyn Restarter) {
        if let Err(err) = self.one_iteration(fetcher, clock, renderer) {
            self.failure_count += 1;
            error!("Error in main loop ({} of {} allowed): {}",
                   self.failure_count, self.failure_threshold, err);
            if self.failure_count > self.failure_threshold {
                restarter.restart();
            }
        }
        self.station_index = (self.station_index + 1) % self.stations.len();
    }

    pub fn run(&mut self, fetcher: &dyn fetch::Fetcher, clock: &dyn clock::Clock, renderer: &mut dyn drawing::Render, restarter: &mut dyn Restarter) -> ! {
        loop {
            self.cycle(fetcher, clock, renderer, restarter);
            std::thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate chrono;

    use super::{Restarter, ScheduleLoop};
    use crate::clock;
    use crate::config;
    use crate::drawing;
    use crate::result;

    struct FixedClock(chrono::NaiveDateTime);

    impl clock::Clock for FixedClock {
        fn now(&self) -> chrono::NaiveDateTime {
            return self.0;
        }
    }

    fn ten_oh_four() -> FixedClock {
        return FixedClock(chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                          .and_hms_opt(10, 4, 0).unwrap());
    }

    struct RecordingRenderer {
        fail: bool,
        states: Vec<drawing::DisplayState>,
    }

    impl drawing::Render for RecordingRenderer {
        fn render(&mut self, state: &drawing::DisplayState) -> result::DashResult<()> {
            if self.fail {
                return Err(result::DashError::IoError(
                    std::io::Error::new(std::io::ErrorKind::Other, "panel unplugged")));
            }
            self.states.push(state.clone());
            return Ok(());
        }
    }

    struct CountingRestarter {
        restarts: u32,
    }

    impl Restarter for CountingRestarter {
        fn restart(&mut self) {
            self.restarts += 1;
        }
    }

    fn config_with(names: &[&str], threshold: u32) -> config::Config {
        let mut config = config::Config::default();
        config.failure_threshold = threshold;
        config.stations = names.iter().map(|name| config::Station{
            name: name.to_string(),
            endpoint: format!("https://api-v3.mbta.com/predictions?filter[stop]={}", name),
        }).collect();
        return config;
    }

    fn golden_fetcher(url: &str) -> result::DashResult<String> {
        assert!(url.starts_with("https://api-v3.mbta.com/predictions"));
        return Ok(std::fs::read_to_string("testdata/mbta_two.json").expect("mbta_two.json"));
    }

    #[test]
    fn end_to_end_prudential() {
        let config = config_with(&["Pru", "BBY"], 5);
        let mut schedule = ScheduleLoop::new(&config);
        let mut renderer = RecordingRenderer{fail: false, states: vec![]};
        let mut restarter = CountingRestarter{restarts: 0};

        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut renderer, &mut restarter);

        assert_eq!(1, renderer.states.len());
        let state = &renderer.states[0];
        assert_eq!("Pru", state.station_name);
        assert_eq!("10:04", state.time);
        assert_eq!("Arr", state.train1);
        assert_eq!("16 min", state.train2);
        assert_eq!(drawing::Background::GreenLine, state.background);
        assert_eq!(0, schedule.failure_count());
    }

    #[test]
    fn round_robin_wraps() {
        let config = config_with(&["Pru", "BBY", "Kenmore"], 5);
        let mut schedule = ScheduleLoop::new(&config);
        let mut renderer = RecordingRenderer{fail: false, states: vec![]};
        let mut restarter = CountingRestarter{restarts: 0};

        let mut indexes = vec![];
        for _ in 0..7 {
            indexes.push(schedule.station_index());
            schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut renderer, &mut restarter);
        }

        assert_eq!(vec![0, 1, 2, 0, 1, 2, 0], indexes);
        let names: Vec<&str> = renderer.states.iter().map(|s| s.station_name.as_str()).collect();
        assert_eq!(vec!["Pru", "BBY", "Kenmore", "Pru", "BBY", "Kenmore", "Pru"], names);
    }

    #[test]
    fn fetch_failures_do_not_count() {
        let config = config_with(&["Pru"], 0);
        let mut schedule = ScheduleLoop::new(&config);
        let mut renderer = RecordingRenderer{fail: false, states: vec![]};
        let mut restarter = CountingRestarter{restarts: 0};
        let offline = |_: &str| -> result::DashResult<String> {
            return Err(result::make_error("offline"));
        };

        for _ in 0..3 {
            schedule.cycle(&offline, &ten_oh_four(), &mut renderer, &mut restarter);
        }

        assert_eq!(0, schedule.failure_count());
        assert_eq!(0, restarter.restarts);
        assert_eq!(3, renderer.states.len());
        assert_eq!("-----", renderer.states[2].train1);
        assert_eq!("-----", renderer.states[2].train2);
    }

    #[test]
    fn restart_only_after_threshold_is_exceeded() {
        let threshold = 5;
        let config = config_with(&["Pru", "BBY"], threshold);
        let mut schedule = ScheduleLoop::new(&config);
        let mut renderer = RecordingRenderer{fail: true, states: vec![]};
        let mut restarter = CountingRestarter{restarts: 0};

        for _ in 0..threshold {
            schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut renderer, &mut restarter);
        }
        assert_eq!(threshold, schedule.failure_count());
        assert_eq!(0, restarter.restarts);

        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut renderer, &mut restarter);
        assert_eq!(threshold + 1, schedule.failure_count());
        assert_eq!(1, restarter.restarts);
    }

    #[test]
    fn failures_are_never_forgotten() {
        let config = config_with(&["Pru"], 2);
        let mut schedule = ScheduleLoop::new(&config);
        let mut failing = RecordingRenderer{fail: true, states: vec![]};
        let mut working = RecordingRenderer{fail: false, states: vec![]};
        let mut restarter = CountingRestarter{restarts: 0};

        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut failing, &mut restarter);
        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut working, &mut restarter);
        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut failing, &mut restarter);
        assert_eq!(0, restarter.restarts);

        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut failing, &mut restarter);
        assert_eq!(3, schedule.failure_count());
        assert_eq!(1, restarter.restarts);
    }

    #[test]
    fn failed_cycle_still_advances() {
        let config = config_with(&["Pru", "BBY"], 5);
        let mut schedule = ScheduleLoop::new(&config);
        let mut renderer = RecordingRenderer{fail: true, states: vec![]};
        let mut restarter = CountingRestarter{restarts: 0};

        schedule.cycle(&golden_fetcher, &ten_oh_four(), &mut renderer, &mut restarter);
        assert_eq!(1, schedule.station_index());
        assert_eq!("BBY", schedule.current_station().name);
    }
}
