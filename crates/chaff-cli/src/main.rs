use chaff_cli::input::{read_mapping, read_psms, Input};
use chaff_cli::output::write_output;
use chaff_core::pipeline::Pipeline;
use clap::{Arg, Command, ValueHint};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::default()
        .filter_level(log::LevelFilter::Error)
        .parse_env(
            env_logger::Env::default()
                .filter_or("CHAFF_LOG", "error,chaff_core=info,chaff_cli=info,chaff=info"),
        )
        .init();

    let matches = Command::new("chaff")
        .version(clap::crate_version!())
        .about("Confidence estimation and protein inference for DDA search results")
        .arg(
            Arg::new("parameters")
                .required(true)
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help("Path to run parameters (JSON file)")
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("psms")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path to the normalized PSM TSV. Overrides the path listed in the \
                     parameters file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("mapping")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path to the peptide-to-protein mapping TSV. Overrides the path \
                     listed in the parameters file.",
                )
                .value_hint(ValueHint::FilePath),
        )
        .arg(
            Arg::new("output_directory")
                .short('o')
                .long("output_directory")
                .value_parser(clap::builder::NonEmptyStringValueParser::new())
                .help(
                    "Path where the confidence tables will be written. Overrides the \
                     directory specified in the parameters file.",
                )
                .value_hint(ValueHint::DirPath),
        )
        .get_matches();

    let path = matches
        .get_one::<String>("parameters")
        .expect("required argument");
    let mut input = Input::load(path)?;
    if let Some(psms) = matches.get_one::<String>("psms") {
        input.psms = Some(psms.clone());
    }
    if let Some(mapping) = matches.get_one::<String>("mapping") {
        input.mapping = Some(mapping.clone());
    }
    if let Some(dir) = matches.get_one::<String>("output_directory") {
        input.output_directory = Some(dir.clone());
    }

    let table = read_psms(input.psm_path()?)?;
    let mapping = read_mapping(input.mapping_path()?)?;

    let output = Pipeline::new(input.pipeline.clone()).run(&table, &mapping)?;
    if !output.rescoring_converged {
        log::warn!(
            "rescoring hit the iteration cap ({}) without stabilizing; the reported \
             scores come from the final iteration",
            input.pipeline.max_rescoring_iterations
        );
    }
    if let Some((level, err)) = &output.failed {
        log::error!(
            "q-value estimation stopped at the {} level: {}; earlier levels were \
             still written",
            level,
            err
        );
    }

    write_output(&input.output_directory(), &output)?;
    Ok(())
}
