/*!
Ready-made models, used by the binaries and as worked examples of the
library.
 */

pub mod fire;
pub mod wolf_sheep;

use crate::error::{AbsesError, Result};
use crate::model::MainModel;
use crate::modules::Submodel;
use crate::settings::Settings;

pub const MODELS: [&str; 2] = ["fire", "wolf_sheep"];

/// Build the model called `name` from `settings`.
pub fn build(name: &str, settings: &Settings) -> Result<(MainModel, Box<dyn Submodel>)> {
    let submodel: Box<dyn Submodel> = match name {
        "fire" => Box::<fire::Forest>::default(),
        "wolf_sheep" => Box::<wolf_sheep::WolfSheep>::default(),
        other => {
            return Err(AbsesError::NotFound(format!(
                "Unknown model '{}', choose one of {:?}.",
                other, MODELS
            )))
        }
    };
    Ok((MainModel::new(settings.clone())?, submodel))
}
