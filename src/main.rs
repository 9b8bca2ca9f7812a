use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::{ArgEnum, Args, Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, error, info, LevelFilter};

use stroke_risk::artifact;
use stroke_risk::batch::{self, OutputFormat};
use stroke_risk::collector::FormInput;
use stroke_risk::{AppContext, CategoryPolicy, Reconciler, RiskConfig, RiskError};

#[tokio::main]
async fn main() -> Result<(), RiskError> {
    let start_time = Instant::now();
    let cli = StrokeRiskArgs::parse();

    let log_level = match cli.verbose {
        1 => LevelFilter::Debug,
        2 => LevelFilter::Trace,
        _ => LevelFilter::Info,
    };

    let env = Env::new().filter("STROKE_LOG");
    Builder::new()
        .filter(Some("stroke_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    stroke_risk_app(cli).await?;

    info!("Time elapsed: {:?}", start_time.elapsed());
    Ok(())
}

#[derive(Parser, Debug)]
#[clap(author, version, about = "Stroke risk prediction", long_about = None)]
#[clap(propagate_version = true)]
pub struct StrokeRiskArgs {
    #[clap(short, long, parse(from_os_str), help = "Model artifact path")]
    model: Option<PathBuf>,
    #[clap(short, long, parse(from_os_str), help = "Configuration file (JSON)")]
    config: Option<PathBuf>,
    #[clap(long, arg_enum, help = "Category validation policy")]
    policy: Option<PolicyArg>,
    #[clap(long, help = "Upper bound of the derived bmi_capped feature")]
    bmi_cap: Option<f64>,
    #[clap(short, long, parse(from_occurrences), help = "Verbose level")]
    verbose: usize,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a single patient record
    Predict(PredictArgs),
    /// Score every row of a stroke dataset CSV
    Batch {
        #[clap(short, long, parse(from_os_str), help = "Input CSV path")]
        input: PathBuf,
        #[clap(short, long, parse(from_os_str), help = "Output path")]
        output: PathBuf,
        #[clap(short, long, arg_enum, default_value_t = WriteFormat::Undefined,
        help = "Output format")]
        format: WriteFormat,
    },
    /// Show how the model artifact resolves and which encoding it gets
    Inspect,
}

#[derive(Args, Debug)]
struct PredictArgs {
    #[clap(long, help = "Age in years (1-100)")]
    age: f64,
    #[clap(long, help = "Hypertension (0 or 1)")]
    hypertension: i64,
    #[clap(long, help = "Heart disease (0 or 1)")]
    heart_disease: i64,
    #[clap(long, help = "Average glucose level (50.0-300.0)")]
    avg_glucose_level: f64,
    #[clap(long, help = "BMI (10.0-60.0)")]
    bmi: f64,
    #[clap(long, help = "Male or Female")]
    gender: String,
    #[clap(long, help = "Yes or No")]
    ever_married: String,
    #[clap(long, help = "Private, Self-employed, Govt_job, children or Never_worked")]
    work_type: String,
    #[clap(long, help = "Urban or Rural")]
    residence_type: String,
    #[clap(long, help = "formerly smoked, never smoked, smokes or Unknown")]
    smoking_status: String,
}

impl PredictArgs {
    fn into_form(self) -> FormInput {
        FormInput {
            age: self.age,
            hypertension: self.hypertension,
            heart_disease: self.heart_disease,
            avg_glucose_level: self.avg_glucose_level,
            bmi: self.bmi,
            gender: self.gender,
            ever_married: self.ever_married,
            work_type: self.work_type,
            residence_type: self.residence_type,
            smoking_status: self.smoking_status,
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, ArgEnum)]
enum WriteFormat {
    Undefined = 0,
    Csv = 1,
    Parquet = 2,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, ArgEnum)]
enum PolicyArg {
    Strict,
    Permissive,
}

impl From<PolicyArg> for CategoryPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Strict => CategoryPolicy::Strict,
            PolicyArg::Permissive => CategoryPolicy::Permissive,
        }
    }
}

async fn stroke_risk_app(opts: StrokeRiskArgs) -> Result<(), RiskError> {
    let mut config = match &opts.config {
        Some(path) => RiskConfig::from_file(path).await?,
        None => RiskConfig::default(),
    };
    if let Some(model) = opts.model {
        config.model_path = model;
    }
    if let Some(policy) = opts.policy {
        config.category_policy = policy.into();
    }
    if let Some(bmi_cap) = opts.bmi_cap {
        config.bmi_cap = bmi_cap;
    }
    config.validate()?;

    match opts.command {
        Command::Inspect => {
            let shape = artifact::load(&config.model_path).await?;
            println!("Artifact: {}", shape);
            let model = shape.into_model()?;
            let reconciler = Reconciler::new(model.contract().clone(), &config);
            println!("Strategy: {}", reconciler.strategy());
            println!("Features:");
            for feature in model.contract().features() {
                println!("  {:<32} {:?}", feature.name, feature.kind);
            }
        }
        Command::Predict(args) => {
            // the model must be readable before any submission is accepted
            let ctx = AppContext::load(&config).await?;
            let result = args.into_form().collect().and_then(|raw| ctx.assess(&raw));
            match result {
                Ok(assessment) => println!("{}", assessment),
                Err(e) if e.is_per_submission() => {
                    error!("Submission rejected: {}", e);
                    eprintln!("Unable to score this record: {}", e);
                    process::exit(2);
                }
                Err(e) => return Err(e),
            }
        }
        Command::Batch {
            input,
            output,
            format,
        } => {
            let output_format = match format {
                WriteFormat::Csv => OutputFormat::Csv,
                WriteFormat::Parquet => OutputFormat::Parquet,
                WriteFormat::Undefined => OutputFormat::infer(&output).ok_or_else(|| {
                    RiskError::Config(format!("cannot infer output format of {:?}", output))
                })?,
            };
            let ctx = AppContext::load(&config).await?;
            let summary = batch::run(&ctx, &input, &output, output_format).await?;
            println!(
                "{} rows scored, {} rejected",
                summary.scored, summary.rejected
            );
        }
    }

    Ok(())
}
