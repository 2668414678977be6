use abses::cli::PushAssignment;
use abses::experiment::Experiment;
use abses::settings::Settings;
use abses::{demos, observation};
use serde_json::Value as Json;
use std::collections::BTreeMap;

fn main() -> Result<(), String> {
    let mut model = "fire".to_string();
    let mut config: Option<String> = None;
    let mut repeats: u64 = 1;
    let mut parallels: usize = 1;
    let mut steps: u64 = 100;
    let mut seed: Option<u64> = None;
    let mut output = "experiment.json".to_string();
    let mut log_level = "warn".to_string();
    let mut vary: Vec<(String, Json)> = Vec::new();
    {
        let mut parser = argparse::ArgumentParser::new();
        parser.set_description("Run a model repeatedly over varied settings");
        parser.refer(&mut model).add_option(
            &["--model"],
            argparse::Store,
            "model to run: fire or wolf_sheep",
        );
        parser.refer(&mut config).add_option(
            &["--config"],
            argparse::StoreOption,
            "JSON settings file",
        );
        parser.refer(&mut repeats).add_option(
            &["--repeats"],
            argparse::Store,
            "number of runs per combination of settings",
        );
        parser.refer(&mut parallels).add_option(
            &["--parallels"],
            argparse::Store,
            "number of runs executed at the same time",
        );
        parser.refer(&mut steps).add_option(
            &["--steps"],
            argparse::Store,
            "number of ticks of every run, 0 to run until the configured end time",
        );
        parser.refer(&mut seed).add_option(
            &["--seed"],
            argparse::StoreOption,
            "base seed the seeds of all runs are derived from",
        );
        parser.refer(&mut vary).add_option(
            &["--vary"],
            PushAssignment,
            "values to try for a setting, e.g. model.density=[0.4,0.6]; can be repeated",
        );
        parser.refer(&mut output).add_option(
            &["--output"],
            argparse::Store,
            "file to write the results of all runs to",
        );
        parser.refer(&mut log_level).add_option(
            &["--log-level"],
            argparse::Store,
            "log level unless RUST_LOG is set",
        );
        parser.parse_args_or_exit();
    }
    observation::init_logging(&log_level);

    let mut settings = match config {
        Some(path) => Settings::from_file(path).map_err(|e| e.to_string())?,
        None => Settings::default(),
    };
    if let Some(seed) = seed {
        settings.set("exp.seed", Json::from(seed));
    }
    let mut overrides: BTreeMap<String, Vec<Json>> = BTreeMap::new();
    for (key, values) in vary {
        let values = match values {
            Json::Array(values) => values,
            single => vec![single],
        };
        overrides.insert(key, values);
    }

    let mut exp = Experiment::new(settings, move |s| demos::build(&model, s));
    if steps > 0 {
        exp = exp.steps(steps);
    }
    exp.batch_run(repeats, parallels, &overrides)
        .map_err(|e| e.to_string())?;
    exp.to_json(&output).map_err(|e| e.to_string())?;
    for row in exp.summary() {
        println!("{:?}", row);
    }
    Ok(())
}
