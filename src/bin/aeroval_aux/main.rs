use std::{io::Write, path::Path, process::ExitCode};

use aeroval_aux::{
    config::EvalConfig,
    cube::Cube,
    logging::init_logging,
    registry::{funs, Registry},
};
use clap::Parser;
use error_stack::ResultExt;

mod cli;

fn main() -> ExitCode {
    let clargs = cli::Cli::parse();
    if let Err(e) = init_logging(clargs.verbosity.log_level_filter(), clargs.log_file.as_deref()) {
        eprintln!("ERROR: {e}");
        return ExitCode::FAILURE;
    }
    if let Err(e) = main_inner(clargs) {
        eprintln!("ERROR: {e:?}");
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn main_inner(clargs: cli::Cli) -> error_stack::Result<(), CliError> {
    let registry = funs();
    match clargs.command {
        cli::Commands::CheckConfig(check_cli) => check_config(check_cli, &registry),
        cli::Commands::ListFuncs => list_funcs(&registry),
        cli::Commands::Apply(apply_cli) => apply(apply_cli, &registry),
    }
}

fn load_config(config_file: &Path, use_env: bool) -> error_stack::Result<EvalConfig, CliError> {
    let config = if use_env {
        EvalConfig::load(config_file)
    } else {
        EvalConfig::from_toml_file(config_file)
    };
    config.change_context_lazy(|| CliError::context(format!(
        "Error loading configuration from {}", config_file.display()
    )))
}

fn check_config(cli: cli::CheckConfigCli, registry: &Registry) -> error_stack::Result<(), CliError> {
    let config = load_config(&cli.config_file, !cli.no_env)?;
    config.validate(registry)
        .change_context_lazy(|| CliError::context(format!(
            "Configuration in {} is not valid", cli.config_file.display()
        )))?;

    if cli.full {
        println!("Configuration:\n\n{config:#?}");
        return Ok(());
    }

    let mut builder = tabled::builder::Builder::new();
    builder.push_record(["kind", "name", "id", "variables"]);
    for (name, model) in config.model_cfg.iter() {
        let aux = model.model_read_aux.keys().map(|k| k.as_str()).collect::<Vec<_>>().join(", ");
        builder.push_record(["model", name.as_str(), model.model_id.as_str(), aux.as_str()]);
    }
    for (name, obs) in config.obs_cfg.iter() {
        builder.push_record(["obs".to_string(), name.clone(), obs.obs_id.clone(), obs.obs_vars.join(", ")]);
    }
    let mut table = builder.build();
    table.with(tabled::settings::Style::blank());

    let periods = config.periods.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
    println!("Experiment {} / {}: {}", config.proj_id, config.exp_id, config.exp_name);
    println!("Periods: {periods}; colocation frequency: {}; main frequency: {}", config.ts_type, config.main_freq);
    println!("{table}");
    Ok(())
}

fn list_funcs(registry: &Registry) -> error_stack::Result<(), CliError> {
    let mut builder = tabled::builder::Builder::new();
    builder.push_record(["signature", "description"]);
    for f in registry.iter() {
        builder.push_record([f.signature(), f.description.to_string()]);
    }
    let mut table = builder.build();
    table.with(tabled::settings::Style::blank())
        .with(tabled::settings::Alignment::left());
    println!("{table}");
    Ok(())
}

fn apply(cli: cli::ApplyCli, registry: &Registry) -> error_stack::Result<(), CliError> {
    let config = match &cli.config {
        Some(p) => Some(load_config(p, true)?),
        None => None,
    };

    let preprocess = config.as_ref().zip(cli.kind);
    let inputs = read_inputs(&cli.inputs, preprocess)?;

    let result = registry.call(&cli.func, inputs)
        .change_context_lazy(|| CliError::context(format!("Error computing {}", cli.func)))?;

    let json = serde_json::to_string_pretty(&result)
        .change_context_lazy(|| CliError::context("Error serializing the result"))?;
    if let Some(output) = &cli.output {
        std::fs::write(output, json)
            .change_context_lazy(|| CliError::context(format!("Error writing {}", output.display())))?;
        log::info!("Wrote {} to {}", result.var_name, output.display());
    } else {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{json}")
            .change_context_lazy(|| CliError::context("Error writing to stdout"))?;
    }
    Ok(())
}

/// Read the input cubes named on the command line; "-" is an absent input.
///
/// If a configuration is given, its outlier and zero masking is applied to each
/// cube, using the observation or model switch depending on `kind`.
fn read_inputs(inputs: &[String], preprocess: Option<(&EvalConfig, cli::DataKind)>) -> error_stack::Result<Vec<Option<Cube>>, CliError> {
    let mut cubes = vec![];
    for input in inputs.iter() {
        if input == "-" {
            cubes.push(None);
            continue;
        }

        let mut cube = read_cube(Path::new(input))?;
        if let Some((config, kind)) = preprocess {
            let n = config.preprocess(&mut cube, matches!(kind, cli::DataKind::Obs));
            log::info!("Masked {n} values in {input}");
        }
        cubes.push(Some(cube));
    }
    Ok(cubes)
}

fn read_cube(path: &Path) -> error_stack::Result<Cube, CliError> {
    let f = std::fs::File::open(path)
        .change_context_lazy(|| CliError::context(format!("Error opening {}", path.display())))?;
    serde_json::from_reader(std::io::BufReader::new(f))
        .change_context_lazy(|| CliError::context(format!("Error reading a cube from {}", path.display())))
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Context(String),
}

impl CliError {
    fn context<S: ToString>(msg: S) -> Self {
        Self::Context(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use aeroval_aux::{config::EvalConfig, registry::funs};
    use clap::Parser;

    use crate::{cli, read_inputs};

    fn input_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test-data").join("inputs")
    }

    fn apply_input(name: &str) -> String {
        input_dir().join("apply").join(name).display().to_string()
    }

    #[test]
    fn test_dash_is_absent_input() {
        let inputs = ["-".to_string(), apply_input("concno3f.json")];
        let cubes = read_inputs(&inputs, None).unwrap();
        assert!(cubes[0].is_none());
        assert_eq!(cubes[1].as_ref().map(|c| c.var_name.as_str()), Some("concno3f"));

        let out = funs().call("calc_concno310", cubes).unwrap();
        assert_eq!(out.var_name, "concNno310");
        assert_eq!(out.units, "ug N m-3");
        let expected = 2.5 * aeroval_aux::species::NO3_TO_N;
        approx::assert_abs_diff_eq!(out.data[[1]], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_obs_and_model_masking() {
        let config = EvalConfig::from_toml_file(&input_dir().join("cfg_testing_aeronet.toml")).unwrap();
        let inputs = [apply_input("concpm10.json")];

        let obs = read_inputs(&inputs, Some((&config, cli::DataKind::Obs))).unwrap();
        let obs = obs[0].as_ref().unwrap();
        assert!(obs.data[[0]].is_nan());
        assert_eq!(obs.data[[1]], 20.0);
        assert!(obs.data[[2]].is_nan());
        assert_eq!(obs.attributes.get("station").map(|s| s.as_str()), Some("Birkenes"));

        let model = read_inputs(&inputs, Some((&config, cli::DataKind::Model))).unwrap();
        let model = model[0].as_ref().unwrap();
        assert_eq!(model.data[[0]], -10.0);
        assert_eq!(model.data[[2]], 6000.0);

        let raw = read_inputs(&inputs, None).unwrap();
        assert_eq!(raw[0].as_ref().unwrap().data[[2]], 6000.0);
    }

    #[test]
    fn test_missing_input_file() {
        let inputs = [apply_input("concno3c.json")];
        assert!(read_inputs(&inputs, None).is_err());
    }

    #[test]
    fn test_config_and_kind_required_together() {
        assert!(cli::Cli::try_parse_from(["aeroval-aux", "apply", "calc_concno325", "a.json", "--kind", "obs"]).is_err());
        assert!(cli::Cli::try_parse_from(["aeroval-aux", "apply", "calc_concno325", "a.json", "--config", "c.toml"]).is_err());
        assert!(cli::Cli::try_parse_from(["aeroval-aux", "apply", "calc_concno325", "a.json", "--config", "c.toml", "--kind", "model"]).is_ok());
    }
}
