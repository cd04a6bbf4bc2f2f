use churnguard_core::{CustomerRecord, Gender, Geography};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "churnguard")]
#[command(author, version, about = "Predict customer churn risk with the bundled model")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate one customer record and predict churn
    Predict {
        #[command(flatten)]
        customer: CustomerArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show where the model is looked up and what is there
    Inspect {
        #[command(flatten)]
        model: ModelArgs,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Model location and configuration file
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Model directory (overrides config and CHURNGUARD_MODEL_PATH)
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Serving config file
    #[arg(short, long, env = "CHURNGUARD_CONFIG", default_value = "./churnguard.yaml")]
    pub config: PathBuf,
}

/// The ten customer fields
#[derive(Args, Debug, Clone)]
pub struct CustomerArgs {
    #[arg(long, default_value = "650", allow_negative_numbers = true)]
    pub credit_score: i32,

    #[arg(long, default_value = "35", allow_negative_numbers = true)]
    pub age: i32,

    /// Years with the bank
    #[arg(long, default_value = "3", allow_negative_numbers = true)]
    pub tenure: i32,

    #[arg(long, default_value = "50000", allow_negative_numbers = true)]
    pub balance: f64,

    #[arg(long = "num-products", default_value = "2", allow_negative_numbers = true)]
    pub num_of_products: i32,

    /// 1 if the customer holds a credit card, else 0
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub has_cr_card: u8,

    /// 1 if the customer is an active member, else 0
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub is_active_member: u8,

    #[arg(long = "salary", default_value = "50000", allow_negative_numbers = true)]
    pub estimated_salary: f64,

    /// Male or Female
    #[arg(long, default_value = "Male", value_parser = parse_gender)]
    pub gender: Gender,

    /// France, Germany or Spain
    #[arg(long, default_value = "France", value_parser = parse_geography)]
    pub geography: Geography,
}

impl From<CustomerArgs> for CustomerRecord {
    fn from(args: CustomerArgs) -> Self {
        Self {
            credit_score: args.credit_score,
            age: args.age,
            tenure: args.tenure,
            balance: args.balance,
            num_of_products: args.num_of_products,
            has_cr_card: args.has_cr_card == 1,
            is_active_member: args.is_active_member == 1,
            estimated_salary: args.estimated_salary,
            gender: args.gender,
            geography: args.geography,
        }
    }
}

fn parse_gender(s: &str) -> Result<Gender, String> {
    s.parse().map_err(|e: churnguard_core::Error| e.to_string())
}

fn parse_geography(s: &str) -> Result<Geography, String> {
    s.parse().map_err(|e: churnguard_core::Error| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_predict_defaults_match_default_record() {
        let cli = Cli::try_parse_from(["churnguard", "predict"]).unwrap();
        match cli.command {
            Commands::Predict { customer, json, .. } => {
                assert!(!json);
                assert_eq!(CustomerRecord::from(customer), CustomerRecord::default());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_predict_flags() {
        let cli = Cli::try_parse_from([
            "churnguard",
            "predict",
            "--balance",
            "-1",
            "--gender",
            "female",
            "--geography",
            "Germany",
            "--has-cr-card",
            "0",
            "--num-products",
            "4",
            "--json",
        ])
        .unwrap();

        match cli.command {
            Commands::Predict { customer, json, .. } => {
                assert!(json);
                let record = CustomerRecord::from(customer);
                assert_eq!(record.balance, -1.0);
                assert_eq!(record.gender, Gender::Female);
                assert_eq!(record.geography, Geography::Germany);
                assert!(!record.has_cr_card);
                assert_eq!(record.num_of_products, 4);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_categories_and_flags() {
        assert!(Cli::try_parse_from(["churnguard", "predict", "--geography", "Italy"]).is_err());
        assert!(Cli::try_parse_from(["churnguard", "predict", "--gender", "x"]).is_err());
        assert!(Cli::try_parse_from(["churnguard", "predict", "--has-cr-card", "2"]).is_err());
    }

    #[test]
    fn test_inspect_model_override() {
        let cli = Cli::try_parse_from(["churnguard", "inspect", "--model", "/srv/model"]).unwrap();
        match cli.command {
            Commands::Inspect { model, .. } => {
                assert_eq!(model.model, Some(PathBuf::from("/srv/model")))
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
