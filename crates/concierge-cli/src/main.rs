use anyhow::Result;
use clap::Parser;
use colored::*;
use concierge_common::{AgentConfig, DEFAULT_USE_CASE, KnowledgeBaseConfig};
use concierge_core::{
    CustomerContext, CustomerServiceAgent, KnowledgeBase, LLMService, StreamFragment,
    StructuredOutput,
};
use futures::StreamExt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for the Concierge CLI
#[derive(Parser)]
#[command(
    name = "concierge",
    about = "Concierge - customer-service responder with sentiment and intent labels"
)]
pub struct Args {
    /// Message to answer; repeat for several. Without it an interactive prompt starts
    #[clap(short, long)]
    message: Vec<String>,

    /// Use-case selecting the tone of replies (support, sales, therapy)
    #[clap(short, long, default_value = DEFAULT_USE_CASE)]
    use_case: String,

    /// Knowledge base file (.json, .yaml or .yml); the bundled sample is used otherwise
    #[clap(short, long)]
    knowledge_base: Option<PathBuf>,

    /// Model to use, overriding CONCIERGE_MODEL
    #[clap(long)]
    model: Option<String>,

    /// Sampling temperature in [0, 1], overriding CONCIERGE_TEMPERATURE
    #[clap(long)]
    temperature: Option<f64>,

    /// Enable debug mode
    #[clap(short, long)]
    debug: bool,

    /// Print the reply chunk by chunk
    #[clap(long)]
    stream: bool,
}

fn load_config(args: &Args) -> Result<AgentConfig> {
    let config = AgentConfig::from_env()?;
    let mut builder = config.to_builder();
    if let Some(model) = &args.model {
        builder = builder.model_name(model.clone());
    }
    if let Some(temperature) = args.temperature {
        builder = builder.temperature(temperature);
    }
    if let Some(path) = &args.knowledge_base {
        builder = builder.knowledge_base(Some(KnowledgeBaseConfig::new(path.clone())));
    }
    Ok(builder.build()?)
}

fn print_labels(intent: &str, sentiment: &str) {
    println!(
        "{} {}   {} {}",
        "Intent:".bright_yellow(),
        intent.bright_blue(),
        "Sentiment:".bright_yellow(),
        sentiment.bright_magenta()
    );
}

fn print_output(output: &StructuredOutput) {
    println!("{}", output.response);
    print_labels(&output.intent, &output.sentiment);
}

/// Answer one message, printing the reply or the error
async fn answer(agent: &CustomerServiceAgent, message: &str, stream: bool) -> Result<()> {
    print!("{}", "Agent: ".bright_green().bold());
    io::stdout().flush()?;

    if !stream {
        match agent.handle_message(message).await {
            Ok(output) => print_output(&output),
            Err(e) => println!("{}", format!("❌ {}: {}", e.kind(), e).red()),
        }
        return Ok(());
    }

    match agent.handle_message_stream(message).await {
        Ok(mut fragments) => {
            while let Some(fragment) = fragments.next().await {
                match fragment {
                    StreamFragment::Response(chunk) => {
                        print!("{}", chunk);
                        io::stdout().flush()?;
                    }
                    StreamFragment::Labels { intent, sentiment } => {
                        println!();
                        print_labels(&intent, &sentiment);
                    }
                }
            }
        }
        Err(e) => println!("{}", format!("❌ {}: {}", e.kind(), e).red()),
    }
    Ok(())
}

/// Interactive prompt loop
async fn conversation_loop(agent: &CustomerServiceAgent, stream: bool) -> Result<()> {
    println!(
        "{}",
        "💬 Starting conversation. Type 'quit' or 'exit' to stop.".bright_green()
    );
    println!();

    loop {
        print!("{}", "You: ".bright_cyan().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit") {
            println!("{}", "👋 Goodbye!".bright_green());
            break;
        }

        answer(agent, input, stream).await?;
        println!();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            println!("{}", format!("❌ Invalid configuration: {}", e).red());
            return Err(e);
        }
    };
    info!("Model: {}", config.model_name());

    let knowledge_base = match config.knowledge_base() {
        Some(kb_config) => KnowledgeBase::load(kb_config)?,
        None => KnowledgeBase::sample(),
    };
    let context = CustomerContext::new(args.use_case.clone(), Arc::new(knowledge_base))?;
    let llm_service = LLMService::from_config(&config)?;
    let agent = CustomerServiceAgent::new(Arc::new(config), context, Arc::new(llm_service))?;

    println!(
        "{} {}",
        "🤝 Concierge ready for use-case".bright_cyan().bold(),
        args.use_case.bright_green().bold()
    );

    if args.message.is_empty() {
        conversation_loop(&agent, args.stream).await?;
    } else {
        for message in &args.message {
            println!("{} {}", "You:".bright_cyan().bold(), message);
            answer(&agent, message, args.stream).await?;
            println!();
        }
    }

    Ok(())
}
