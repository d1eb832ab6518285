use clap::Subcommand;
use serde_json::json;

use crate::backend::User;
use crate::cli::utils::{output_success, output_value, parse_params};
use crate::cli::OutputFormat;
use crate::translator::QueryTranslator;

#[derive(Subcommand)]
pub enum TranslateCommands {
    #[command(about = "Print the backend query built for a collection")]
    Query {
        #[arg(help = "Collection name")]
        collection: String,
        #[arg(long, help = "Request JSON (filters, orders, includes)")]
        params: Option<String>,
    },

    #[command(about = "Print the ACL built from a request's acl section")]
    Acl {
        #[arg(long, help = "Request JSON with an acl section")]
        params: String,
        #[arg(long, help = "Id of the signed-in user for currentUser ACLs")]
        user_id: Option<String>,
    },
}

pub fn handle(cmd: TranslateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TranslateCommands::Query { collection, params } => {
            let params = parse_params(params.as_deref())?;
            let query = QueryTranslator::build_query(&collection, params.as_ref());
            output_value(output_format, &query.to_json())
        }
        TranslateCommands::Acl { params, user_id } => {
            let params = parse_params(Some(&params))?;
            let user = user_id.map(|id| User::new(id, String::new()));
            match QueryTranslator::build_acl(params.as_ref(), user.as_ref()) {
                Some(acl) => output_value(output_format, &acl.to_json()),
                None => output_success(output_format, "No ACL requested", Some(json!({ "acl": null }))),
            }
        }
    }
}
