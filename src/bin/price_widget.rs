use pricewatch::{
    init_logging, log_app_exit, log_app_start, log_scheduler_status, logging_config_from_env,
    parse_category, widget_config_from_env, Category, HostEvent, HttpPriceFetcher, LifecycleGate,
    LifecycleSignal, RefreshScheduler, Subscription, TextRenderer, Visibility,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WidgetCommand {
    Show,
    Hide,
    Activate,
    Deactivate,
    Retry,
    Tab(Category),
    Status,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;

    let widget_cfg = widget_config_from_env();
    widget_cfg.validate()?;
    log_app_start(&logging_cfg, &widget_cfg);

    let fetcher = HttpPriceFetcher::from_config(&widget_cfg)?;
    let renderer = TextRenderer::new(std::io::stdout());
    let tabs = renderer.clone();
    let (scheduler, scheduler_task) =
        RefreshScheduler::from_config(fetcher, renderer, &widget_cfg).spawn();

    let mut gate = LifecycleGate::new(scheduler.clone());
    let visibility = gate.subscribe_visibility();
    let host = gate.subscribe_host(widget_cfg.host_bridge);

    scheduler.start()?;

    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    tokio::spawn(read_commands(command_tx));

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut stdin_open = true;

    let exit_reason = loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break "ctrl_c";
            }
            command = command_rx.recv(), if stdin_open => match command {
                None => stdin_open = false,
                Some(WidgetCommand::Quit) => break "quit",
                Some(WidgetCommand::Show) => send_or_warn(Some(&visibility), Visibility::Visible),
                Some(WidgetCommand::Hide) => send_or_warn(Some(&visibility), Visibility::Hidden),
                Some(WidgetCommand::Activate) => send_or_warn(host.as_ref(), HostEvent::Activated),
                Some(WidgetCommand::Deactivate) => {
                    send_or_warn(host.as_ref(), HostEvent::Deactivated)
                }
                Some(WidgetCommand::Retry) => scheduler.trigger_once()?,
                Some(WidgetCommand::Tab(category)) => tabs.select_tab(category),
                Some(WidgetCommand::Status) => log_scheduler_status(&scheduler.status().await?),
            },
        }
    };

    gate.teardown()?;
    let final_status = scheduler.status().await.ok();
    scheduler.dispose()?;
    scheduler_task.await?;
    log_app_exit(exit_reason, final_status.as_ref());

    Ok(())
}

async fn read_commands(commands: mpsc::UnboundedSender<WidgetCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Some(command) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    None => warn!(
                        component = "price_widget",
                        event = "stdin.unknown_command",
                        line = %line.trim()
                    ),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(
                    component = "price_widget",
                    event = "stdin.read_error",
                    error = %err
                );
                break;
            }
        }
    }
}

fn parse_command(raw: &str) -> Option<WidgetCommand> {
    let mut parts = raw.split_whitespace();
    let verb = parts.next()?.to_ascii_lowercase();

    match verb.as_str() {
        "show" => Some(WidgetCommand::Show),
        "hide" => Some(WidgetCommand::Hide),
        "activate" => Some(WidgetCommand::Activate),
        "deactivate" => Some(WidgetCommand::Deactivate),
        "retry" => Some(WidgetCommand::Retry),
        "status" => Some(WidgetCommand::Status),
        "quit" | "exit" => Some(WidgetCommand::Quit),
        "tab" => parts.next().and_then(parse_category).map(WidgetCommand::Tab),
        _ => None,
    }
}

fn send_or_warn<S>(subscription: Option<&Subscription<S>>, event: S)
where
    S: Into<LifecycleSignal> + Copy,
{
    let signal = event.into().as_str();
    match subscription {
        Some(subscription) => {
            if let Err(err) = subscription.send(event) {
                warn!(
                    component = "price_widget",
                    event = "lifecycle.send_failed",
                    source = subscription.source(),
                    signal,
                    error = %err
                );
            }
        }
        None => warn!(
            component = "price_widget",
            event = "host_bridge.unavailable",
            signal
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lifecycle_and_tab_commands() {
        assert_eq!(parse_command("hide"), Some(WidgetCommand::Hide));
        assert_eq!(parse_command("  SHOW "), Some(WidgetCommand::Show));
        assert_eq!(parse_command("deactivate"), Some(WidgetCommand::Deactivate));
        assert_eq!(
            parse_command("tab coins"),
            Some(WidgetCommand::Tab(Category::Coins))
        );
        assert_eq!(parse_command("exit"), Some(WidgetCommand::Quit));
    }

    #[test]
    fn rejects_unknown_commands_and_tabs() {
        assert_eq!(parse_command("reload"), None);
        assert_eq!(parse_command("tab silver"), None);
        assert_eq!(parse_command("tab"), None);
        assert_eq!(parse_command(""), None);
    }
}
