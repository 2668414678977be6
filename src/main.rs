use abses::cli::{parse_args, Options};
use abses::{demos, observation};
use tracing::info;

fn main() -> Result<(), String> {
    let mut o = Options::default();
    {
        let parser = parse_args(&mut o);
        parser.parse_args_or_exit();
    }
    observation::init_logging(&o.log_level);

    let settings = o.settings().map_err(|e| e.to_string())?;
    let (mut model, mut submodel) = demos::build(&o.model, &settings).map_err(|e| e.to_string())?;
    info!(model = %model, "starting");

    let report = model
        .run_model(submodel.as_mut(), o.steps())
        .map_err(|e| e.to_string())?;

    let statefile = model.outpath().join(&model.observation.statefile);
    observation::store_state(&model, &statefile).map_err(|e| e.to_string())?;
    let data = model.outpath().join(format!("{}.db", model.name()));
    model
        .datacollector
        .to_sqlite(&data)
        .map_err(|e| e.to_string())?;
    info!(
        state = %statefile.display(),
        data = %data.display(),
        report = ?report,
        "ended"
    );
    Ok(())
}
