//! `yugent chat`: Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;

use clap::Args;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use yugent_agent::{ExecuteOptions, Layer, Llm, LocalLog, ModelLayer};
use yugent_config::AppConfig;
use yugent_core::stream::StreamAssembler;

#[derive(Debug, Args)]
pub struct ChatArgs {
    /// Send a single message instead of entering interactive mode
    #[arg(short, long)]
    pub message: Option<String>,

    /// Stream the response as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Override the configured provider
    #[arg(long)]
    pub provider: Option<String>,

    /// Override the configured model
    #[arg(long)]
    pub model: Option<String>,

    /// With --stream, print the raw response body instead of the text
    #[arg(long)]
    pub raw: bool,
}

pub async fn run(args: ChatArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    apply_args(&mut config, &args);
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {e}"))?;

    let provider = yugent_providers::build_from_config(&config)?;
    let mut model = ModelLayer::new(Arc::new(provider), &config.model);
    if let Some(prompt) = &config.agent.system_prompt {
        model.system(prompt);
    }

    let mut llm = Llm::new();
    llm.add(model);
    if config.logging.local {
        llm.add(Layer::log(LocalLog));
    }
    for tool in yugent_tools::default_tool_layers(&config.tools) {
        llm.add(tool);
    }
    info!(provider = %config.provider, model = %config.model, "Chat session ready");

    let options = options_for(&config);

    if let Some(message) = args.message {
        llm.human(message)?;
        let reply = execute(&mut llm, &options, args.raw).await?;
        if !options.stream {
            println!("{}", reply);
        }
        return Ok(());
    }

    println!();
    println!("  yugent interactive mode");
    println!("  Provider:  {}", config.provider);
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", config.tools.enabled.join(", "));
    println!();
    println!("  Type 'exit' to quit. Ctrl+C cancels a pending response.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = next_prompt(&mut lines, tokio::signal::ctrl_c()).await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        llm.human(line)?;
        match execute(&mut llm, &options, args.raw).await {
            Ok(reply) if !options.stream => {
                for text in reply.lines() {
                    println!("  Assistant > {text}");
                }
                println!();
            }
            Ok(_) => println!(),
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Read the next prompt line. `None` on end of input or when `interrupt`
/// resolves first.
async fn next_prompt<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => {
            println!();
            Ok(None)
        }
    }
}

fn apply_args(config: &mut AppConfig, args: &ChatArgs) {
    if let Some(provider) = &args.provider {
        config.provider = provider.clone();
    }
    if let Some(model) = &args.model {
        config.model = model.clone();
    }
    if args.stream {
        config.stream = true;
    }
}

fn options_for(config: &AppConfig) -> ExecuteOptions {
    ExecuteOptions::default()
        .streaming(config.stream)
        .with_max_tool_rounds(config.agent.tool_round_limit())
        .with_tool_call_policy(config.agent.tool_call_policy)
        .with_suspend_nested_tool_calls(config.agent.suspend_nested_tool_calls)
}

/// Run one round with Ctrl+C wired to cancellation. Returns the reply text.
async fn execute(
    llm: &mut Llm,
    options: &ExecuteOptions,
    raw: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut options = options.clone().with_cancel(cancel);
    let printer = if options.stream {
        let (tx, rx) = mpsc::unbounded_channel();
        options = options.with_stream_writer(tx);
        Some(spawn_printer(rx, raw))
    } else {
        None
    };

    let result = llm.execute(&options).await;
    watcher.abort();
    // Dropping the options closes the writer so the printer can finish.
    drop(options);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    Ok(result?.text())
}

/// Print streamed fragments as they arrive: raw, or as content deltas.
fn spawn_printer(mut rx: mpsc::UnboundedReceiver<String>, raw: bool) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut assembler = StreamAssembler::new();
        let mut printed = 0;
        let mut stdout = std::io::stdout();
        while let Some(fragment) = rx.recv().await {
            if raw {
                print!("{fragment}");
            } else {
                // Reset the assembler after each leg's [DONE].
                if let Some(message) = assembler.feed(&fragment) {
                    let text = message.text();
                    if text.len() > printed {
                        print!("{}", &text[printed..]);
                    }
                    assembler = StreamAssembler::new();
                    printed = 0;
                } else {
                    let content = assembler.content();
                    if content.len() > printed {
                        print!("{}", &content[printed..]);
                        printed = content.len();
                    }
                }
            }
            let _ = stdout.flush();
        }
        println!();
    })
}
