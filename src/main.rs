use anyhow::Result;

use feedback_sentiment_cnn::train_and_evaluate;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("feedback_sentiment_cnn=info".parse().unwrap()),
        )
        .init();

    let report = train_and_evaluate()?;

    println!("accuracy  = {:.4}", report.accuracy);
    println!("precision = {:.4}", report.precision);
    println!("recall    = {:.4}", report.recall);
    println!("f1_score  = {:.4}", report.f1_score);

    Ok(())
}
