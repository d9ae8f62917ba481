use std::collections::BTreeMap;

use nalgebra::DMatrix;
use rand::SeedableRng;
use rand::rngs::StdRng;

use ditau_fit::app::pipeline::run_fit;
use ditau_fit::domain::{
    DiTauCandidate, DiTauSolution, EventContext, FitConfig, HadronicDecayMode, Leg, LegKind, MissingEt,
    Polarization, TermConfig, VisibleLeg,
};
use ditau_fit::fit::{LegParameter, ParameterTable, SvFitEngine, UncertaintyEstimator};
use ditau_fit::io::{EventFile, read_config_json, read_event_json, write_solutions_json};
use ditau_fit::kinematics::apply_parameters;
use ditau_fit::math::FourMomentum;

fn pion_leg(px: f64, py: f64, pz: f64) -> VisibleLeg {
    let p = nalgebra::Vector3::new(px, py, pz);
    VisibleLeg::new(FourMomentum::from_momentum_and_mass(&p, 0.139_570), LegKind::Hadron)
        .with_decay_mode(HadronicDecayMode::OneProng0Pi0)
}

fn hadronic_candidate() -> DiTauCandidate {
    DiTauCandidate::new(pion_leg(40.0, 0.0, 0.0), pion_leg(-35.0, 0.0, 10.0))
}

fn term(name: &str, plugin_type: &str, params: &[(&str, f64)], leg: Option<Leg>) -> TermConfig {
    TermConfig {
        name: name.to_string(),
        plugin_type: plugin_type.to_string(),
        inputs: BTreeMap::new(),
        params: params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        leg,
    }
}

/// Solution at hand-picked rest-frame angles, used to build a consistent MET.
fn reference_point(candidate: &DiTauCandidate) -> (Vec<f64>, DiTauSolution) {
    let table = ParameterTable::for_candidate(candidate, &BTreeMap::new()).unwrap();
    let mut x = table.start_values();
    x[Leg::First.index(LegParameter::ThetaRest)] = 1.3;
    x[Leg::Second.index(LegParameter::ThetaRest)] = 1.1;
    x[Leg::Second.index(LegParameter::PhiLab)] = 0.7;
    let mut solution = DiTauSolution::template(candidate, Polarization::Unknown, Polarization::Unknown);
    apply_parameters(&mut solution, &x);
    (x, solution)
}

#[test]
fn mass_window_scenario_lands_inside_the_window() {
    let config = FitConfig {
        likelihoods: vec![term(
            "window",
            "MassWindow",
            &[("min", 110.0), ("max", 130.0), ("penalty", 1.0)],
            None,
        )],
        ..FitConfig::default()
    };
    let mut engine = SvFitEngine::from_config(config).unwrap();
    let solutions = engine.fit(&hadronic_candidate()).unwrap();

    assert_eq!(solutions.len(), 1);
    let s = &solutions[0];
    assert_eq!(s.polarizations(), (Polarization::Unknown, Polarization::Unknown));
    assert_eq!(s.fit_status, 0);
    assert!(s.mass() >= 110.0 - 1e-3 && s.mass() <= 130.0 + 1e-3, "mass {}", s.mass());

    // hadronic legs keep a massless neutrino
    assert!(s.leg1.p4_invis.mass().abs() < 1e-6);
    assert_eq!(s.n_free, 4);
    assert!(!s.has_error_estimates);
}

#[test]
fn polarized_scenario_gives_four_solutions_with_breakdowns() {
    let mut candidate = hadronic_candidate();
    let (_, truth) = reference_point(&candidate);
    let nu = truth.invisible_p4();
    candidate.met = Some(MissingEt {
        px: nu.px,
        py: nu.py,
        covariance: None,
    });

    let config = FitConfig {
        num_samplings: 51,
        seed: 3,
        likelihoods: vec![
            term("bw", "DiTauBreitWigner", &[("M", truth.mass()), ("Gamma", 2.5)], None),
            term("met", "MissingEt", &[("sigma_parallel", 10.0), ("sigma_perp", 10.0)], None),
            term("pol1", "TauToPiNuPolarization", &[], Some(Leg::First)),
            term("pol2", "TauToPiNuPolarization", &[], Some(Leg::Second)),
        ],
        ..FitConfig::default()
    };
    let mut engine = SvFitEngine::from_config(config).unwrap();
    engine.begin_event(&EventContext::default()).unwrap();
    let solutions = engine.fit(&candidate).unwrap();

    assert_eq!(solutions.len(), 4);
    assert_eq!(solutions[1].polarizations(), (Polarization::Left, Polarization::Right));
    for s in &solutions {
        assert!(s.fit_status == 0 || s.fit_status == 4, "status {}", s.fit_status);
        assert_eq!(s.log_likelihoods.len(), 4);
        assert!(s.min_objective.is_finite());
        if s.has_error_estimates {
            let band = s.mass_error.unwrap();
            assert!(band.up >= 0.0 && band.down >= 0.0);
            assert!(s.leg1.x_error.is_some());
        } else {
            assert!(s.mass_error.is_none());
        }
    }

    let best = solutions
        .iter()
        .min_by(|a, b| a.min_objective.total_cmp(&b.min_objective))
        .unwrap();
    assert!((best.mass() - truth.mass()).abs() < 0.25 * truth.mass());
}

#[test]
fn even_sampling_count_is_bumped_to_odd() {
    let candidate = hadronic_candidate();
    let (optimum, _) = reference_point(&candidate);
    let template = DiTauSolution::template(&candidate, Polarization::Unknown, Polarization::Unknown);
    let free = vec![
        Leg::First.index(LegParameter::ThetaRest),
        Leg::Second.index(LegParameter::ThetaRest),
    ];
    let covariance = DMatrix::from_diagonal_element(2, 2, 0.01);

    let estimator = UncertaintyEstimator::new(100, 100);
    let mut rng = StdRng::seed_from_u64(0);
    let estimates = estimator
        .estimate(&template, &optimum, &free, &covariance, &mut rng)
        .unwrap();
    assert_eq!(estimates.accepted, 101);
    assert!(estimates.mass.up >= 0.0 && estimates.mass.down >= 0.0);
}

#[test]
fn json_files_drive_the_pipeline() {
    let dir = std::env::temp_dir().join(format!("ditau-fit-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let event = EventFile {
        event: EventContext {
            id: 77,
            ..EventContext::default()
        },
        candidates: vec![hadronic_candidate()],
    };
    let event_path = dir.join("event.json");
    std::fs::write(&event_path, serde_json::to_string(&event).unwrap()).unwrap();

    let config_path = dir.join("config.json");
    std::fs::write(
        &config_path,
        r#"{
            "num_samplings": 0,
            "likelihoods": [
                { "name": "window", "plugin_type": "MassWindow", "params": { "min": 90.0, "max": 100.0 } },
                { "name": "ps1", "plugin_type": "LegPhaseSpace", "leg": "leg1" }
            ]
        }"#,
    )
    .unwrap();

    let config = read_config_json(&config_path).unwrap();
    let event = read_event_json(&event_path).unwrap();
    let run = run_fit(&config, &event).unwrap();
    assert_eq!(run.event, 77);
    assert_eq!(run.solutions[0].len(), 1);

    let out = dir.join("solutions.json");
    write_solutions_json(&out, run.event, &run.solutions).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["candidates"][0]["solutions"][0]["hypothesis"], "??");
    assert!(json["candidates"][0]["solutions"][0]["log_likelihoods"]["ps1"].is_number());

    let _ = std::fs::remove_dir_all(&dir);
}
