//! Process command - runs the workflow on local images

use clap::Args;
use tracing::info;

use crate::domain::{InvoiceProcessor, WorkflowInput};

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Invoice images to process
    #[arg(required = true)]
    pub images: Vec<String>,

    /// Question answered after each invoice is saved
    #[arg(long)]
    pub query: Option<String>,

    /// Images processed at the same time
    #[arg(long, default_value_t = 1)]
    pub concurrency: usize,
}

pub async fn run(args: ProcessArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let app = crate::build_application(&config).await?;

    let inputs = batch_inputs(&args);
    info!(images = inputs.len(), concurrency = args.concurrency, "Processing invoices");

    let states = app.workflow.run_batch(inputs, args.concurrency).await;
    println!("{}", serde_json::to_string_pretty(&states)?);

    let failed = states.iter().filter(|s| !s.errors().is_empty()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} invoices finished with errors", failed, states.len());
    }

    Ok(())
}

fn batch_inputs(args: &ProcessArgs) -> Vec<WorkflowInput> {
    args.images
        .iter()
        .map(|image| {
            let input = WorkflowInput::new(image.as_str());
            match &args.query {
                Some(query) => input.with_query(query.as_str()),
                None => input,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_image_gets_the_query() {
        let args = ProcessArgs {
            images: vec!["a.png".to_string(), "b.png".to_string()],
            query: Some("Total?".to_string()),
            concurrency: 2,
        };

        let inputs = batch_inputs(&args);

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1].image_path, "b.png");
        assert!(inputs.iter().all(|i| i.user_query.as_deref() == Some("Total?")));
    }
}
