extern crate chrono;
extern crate flexi_logger;
extern crate getopts;
extern crate image;
extern crate imageproc;
#[macro_use]
extern crate log;
extern crate reqwest;
extern crate rppal;
extern crate rusttype;
#[macro_use]
extern crate serde_derive;

mod arrival;
mod clock;
mod config;
mod display;
mod drawing;
mod fetch;
mod mbta;
mod result;
mod schedule;

use drawing::Render;

fn setup_logging(matches: &getopts::Matches) -> result::DashResult<flexi_logger::LoggerHandle> {
    let level = matches.opt_str("log-level").unwrap_or("info".to_string());
    let log_dir = matches.opt_str("log-dir").unwrap_or(".".to_string());

    let logger = flexi_logger::Logger::try_with_env_or_str(&level)
        .map_err(|e| result::make_error(&format!("bad log level '{}': {}", level, e)))?
        .log_to_file(flexi_logger::FileSpec::default().directory(log_dir))
        .duplicate_to_stderr(flexi_logger::Duplicate::Info)
        .rotate(
            flexi_logger::Criterion::Size(1024 * 1024),
            flexi_logger::Naming::Numbers,
            flexi_logger::Cleanup::KeepLogFiles(5))
        .format(flexi_logger::detailed_format)
        .start()
        .map_err(|e| result::make_error(&format!("couldn't start logger: {}", e)))?;

    return Ok(logger);
}

fn setup_renderer(config: &config::Config, matches: &getopts::Matches) -> result::DashResult<drawing::MatrixRenderer> {
    let mut sinks: Vec<Box<dyn display::FrameSink>> = vec![];
    if !matches.opt_present("skip-display") {
        sinks.push(Box::new(display::MatrixPanel::open(&config.matrix)?));
    }
    if let Some(png_out) = matches.opt_str("save-image") {
        sinks.push(Box::new(display::PngSink::new(&png_out)));
    }

    let styles = drawing::Styles::from_font_file(&config.font, config.font_scale)?;
    let backgrounds = drawing::BackgroundCache::new(
        config.backgrounds.clone(), config.matrix.width, config.matrix.height);

    return Ok(drawing::MatrixRenderer::new(styles, backgrounds, sinks));
}

fn sync_clock(config: &config::Config, fetcher: &fetch::HttpFetcher, skip: bool) -> result::DashResult<Box<dyn clock::Clock>> {
    if skip {
        info!("Skipping clock sync, using system time");
        return Ok(Box::new(clock::SystemClock));
    }

    let policy = clock::RetryPolicy::from_config(&config.clock_sync);
    let reading = clock::fetch_reading(fetcher, &config.time_api, &policy)?;
    let rtc = clock::SoftwareRtc::set(reading);
    debug!("RTC set from {:?}", rtc.reading());
    return Ok(Box::new(rtc));
}

fn run(matches: &getopts::Matches) -> result::DashResult<()> {
    let config = match matches.opt_str("config") {
        Some(path) => config::from_file(&path)?,
        None => config::Config::default(),
    };
    info!("Running with {} stations, interval={}s, failure threshold={}",
          config.stations.len(), config.poll_interval_secs, config.failure_threshold);

    let mut renderer = setup_renderer(&config, matches)?;
    renderer.render(&drawing::DisplayState::boot())?;

    let fetcher = fetch::HttpFetcher::new(
        std::time::Duration::from_secs(config.request_timeout_secs))?;
    let clock = sync_clock(&config, &fetcher, matches.opt_present("skip-clock-sync"))?;

    let mut restarter = schedule::ExecRestarter;
    let mut schedule = schedule::ScheduleLoop::new(&config);

    if matches.opt_present("one-shot") {
        schedule.cycle(&fetcher, clock.as_ref(), &mut renderer, &mut restarter);
        return Ok(());
    }

    schedule.run(&fetcher, clock.as_ref(), &mut renderer, &mut restarter);
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = getopts::Options::new();
    opts.optopt("c", "config", "JSON config file (stations, interval, assets)", "FILENAME");
    opts.optflag("d", "skip-display", "don't drive the LED matrix");
    opts.optflag("o", "one-shot", "run a single cycle and exit");
    opts.optopt("i", "save-image", "Where to put a png of each frame.", "FILENAME");
    opts.optflag("", "skip-clock-sync", "use the system clock instead of the time API");
    opts.optopt("", "log-dir", "directory for log files", "DIR");
    opts.optopt("", "log-level", "log spec, e.g. 'info' or 'mbtadash=debug'", "SPEC");
    opts.optflag("h", "help", "print this help");

    let matches = match opts.parse(&args[1..]) {
        Ok(matches) => matches,
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("{}", opts.usage("Usage: mbtadash [options]"));
            std::process::exit(2);
        },
    };

    if matches.opt_present("help") {
        println!("{}", opts.usage("Usage: mbtadash [options]"));
        return;
    }

    let _logger = match setup_logging(&matches) {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        },
    };

    if let Err(err) = run(&matches) {
        error!("Fatal: {}", err);
        std::process::exit(1);
    }
}
