use crate::datacollector::{AgentReporter, DataCollector, Reporter};
use crate::prelude::*;
use crate::raster::Raster;

struct Farmer;

impl Breed for Farmer {
    const NAME: &'static str = "Farmer";

    fn setup(actor: &mut Actor) {
        actor.set_own("wealth", 1.);
    }

    fn decisions() -> Vec<Decision> {
        vec![Decision::new("harvest", |model: &MainModel, id| {
            let crop = model.get(id, "crop", Target::Cell)?.and_then(|v| v.as_f64());
            Ok(if crop.unwrap_or(0.) > 0. { "reap" } else { "wait" }.to_string())
        })
        .strategy("reap", "take the crop of the own cell")
        .strategy("wait", "do nothing")
        .respond("reap", |model: &mut MainModel, id| {
            let crop = model.get(id, "crop", Target::Cell)?.and_then(|v| v.as_f64()).unwrap_or(0.);
            let wealth = model.get(id, "wealth", Target::Me)?.and_then(|v| v.as_f64()).unwrap_or(0.);
            model.set(id, "wealth", wealth + crop, Target::Me, false)?;
            model.set(id, "crop", 0., Target::Cell, false)
        })]
    }
}

/// Farmers on a field whose crop grows with time.
struct Farming {
    field: Option<LayerId>,
}

impl Submodel for Farming {
    fn setup(&mut self, model: &mut MainModel) -> Result<()> {
        let field = model.create_layer(LayerSpec::from_resolution("field", (3, 3)).capacity(Some(1)))?;
        model
            .nature
            .layer_mut(field)?
            .add_dynamic_variable("crop", |layer, time| {
                let (h, w) = layer.shape2d();
                Ok(Raster::filled(h, w, time.tick() as f64))
            });
        model.nature.layer(field)?.random().new_actors::<Farmer>(model, 4)?;
        self.field = Some(field);
        Ok(())
    }

    fn step(&mut self, model: &mut MainModel) -> Result<()> {
        for farmer in model.agents.get(&[Farmer::NAME])? {
            model.decide(farmer)?;
        }
        let total: f64 = model.agents.get(&[Farmer::NAME])?.array(model, "wealth")?.iter().sum();
        model.vars.insert("total_wealth".into(), Value::Float(total));
        Ok(())
    }
}

fn farming_settings() -> Settings {
    Settings::from(serde_json::json!({
        "model": {"name": "farming", "seed": 11},
        "reports": {
            "model": {"wealth": "total_wealth"},
            "agents": {"Farmer": {"wealth": "wealth", "crop": "crop"}},
            "final": {"wealth": "total_wealth"}
        }
    }))
}

#[test]
pub fn test_farming_run() {
    let mut model = MainModel::new(farming_settings()).unwrap();
    let report = model.run_model(&mut Farming { field: None }, Some(3)).unwrap();
    // Every tick each farmer reaps the crop that grew on its cell: 1 + 2 + 3.
    assert_eq!(report["wealth"], Value::Float(4. * (1. + 6.)));
    assert_eq!(
        model.datacollector.get_model_vars()["wealth"],
        vec![Value::Float(8.), Value::Float(16.), Value::Float(28.)]
    );
    let rows = model.datacollector.get_agent_vars("Farmer");
    assert_eq!(rows.len(), 12);
    assert!(rows.iter().all(|r| r.values["crop"] == Value::Float(0.)));
    assert_eq!(model.state(), State::Complete);
}

#[test]
pub fn test_cell_capacity_keeps_farmers_apart() {
    let mut model = MainModel::new(farming_settings()).unwrap();
    let mut farming = Farming { field: None };
    farming.setup(&mut model).unwrap();
    let field = model.nature.layer(farming.field.unwrap()).unwrap();
    let counts = field.agents_count().unwrap();
    assert_eq!(counts.sum(), 4.);
    assert!(counts.data().iter().all(|n| *n <= 1.));
}

#[test]
pub fn test_same_seed_same_history() {
    let run = || {
        let mut model = MainModel::new(farming_settings()).unwrap();
        model.run_model(&mut Farming { field: None }, Some(2)).unwrap();
        model
            .agents
            .iter()
            .map(|a| a.at().unwrap())
            .collect::<Vec<CellRef>>()
    };
    assert_eq!(run(), run());
}

#[test]
pub fn test_links_die_with_actors() {
    let mut model = MainModel::new(Settings::default()).unwrap();
    let ids = model.new_actors::<Farmer>(3).unwrap();
    let (a, b, c) = (ids.as_slice()[0], ids.as_slice()[1], ids.as_slice()[2]);
    model.human.links.add_a_link("friend", a.into(), b.into(), true);
    model.human.links.add_a_link("friend", a.into(), c.into(), false);
    let friends = model.linked_actors(a, Some("friend"), LinkDirection::Out).unwrap();
    assert_eq!(friends.len(), 2);
    model.die(b).unwrap();
    let friends = model.linked_actors(a, Some("friend"), LinkDirection::Both).unwrap();
    assert_eq!(friends.into_vec(), vec![c]);
}

#[test]
pub fn test_reporters_from_code() {
    let mut model = MainModel::new(Settings::default()).unwrap();
    let mut dc = DataCollector::default();
    dc.add_model_reporter("n", Reporter::func(|m| Ok(Value::from(m.agents.len()))));
    dc.add_agent_reporter("Farmer", "rich", AgentReporter::func(|m, id| {
        let wealth = m.get(id, "wealth", Target::Me)?.and_then(|v| v.as_f64());
        Ok(Value::Bool(wealth.unwrap_or(0.) > 1.))
    }));
    model.datacollector = dc;
    let ids = model.new_actors::<Farmer>(2).unwrap();
    model.set(ids.as_slice()[0], "wealth", 5., Target::Me, false).unwrap();
    model.collect().unwrap();
    assert_eq!(model.datacollector.get_model_vars()["n"], vec![Value::from(2usize)]);
    let rich: Vec<Value> = model
        .datacollector
        .get_agent_vars("Farmer")
        .iter()
        .map(|r| r.values["rich"].clone())
        .collect();
    assert_eq!(rich, vec![Value::Bool(true), Value::Bool(false)]);
}
