use crate::config::Config;
use anyhow::{anyhow, bail, Context, Result};
use canopy_dom::{MemoryDom, NodeId, Rect, RenderTree};
use canopy_overlay::{InputEvent, Overlay};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// HTML fixture loaded into the document body
    pub fixture: PathBuf,

    /// JSON-lines script of host commands, page input and layout
    pub script: PathBuf,

    /// Config file (defaults to canopy.config.json in the working directory)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print outbound messages as JSON lines only
    #[arg(long)]
    pub json: bool,

    /// Print the document body after the last step
    #[arg(long)]
    pub dump: bool,
}

/// Page input with targets named by CSS selector
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "input", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ScriptInput {
    PointerDown { target: String, x: f64, y: f64 },
    PointerMove { x: f64, y: f64 },
    PointerUp { x: f64, y: f64 },
    PointerOver { target: String, x: f64, y: f64 },
    PointerOut { target: String },
    Click { target: String },
    KeyDown { key: String },
    Blur { target: String },
}

/// Layout box for the element `layout` selects
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Layout {
    pub layout: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One script line. Lines carrying `action` are host commands, `input`
/// lines are page input, `layout` lines place an element and `wait` lines
/// let the rollback cue fade.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Command(Value),
    Input(ScriptInput),
    Layout(Layout),
    Wait(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub line: usize,
    pub label: String,
    /// Whether the platform default would have been suppressed
    pub prevented: bool,
    pub messages: Vec<Value>,
}

pub fn parse_step(line: &str) -> Result<Step> {
    let value: Value = serde_json::from_str(line)?;
    if value.get("action").is_some() {
        Ok(Step::Command(value))
    } else if value.get("input").is_some() {
        Ok(Step::Input(serde_json::from_value(value)?))
    } else if value.get("layout").is_some() {
        Ok(Step::Layout(serde_json::from_value(value)?))
    } else if let Some(ms) = value.get("wait") {
        let ms = ms.as_u64().ok_or_else(|| anyhow!("`wait` takes milliseconds"))?;
        Ok(Step::Wait(u32::try_from(ms).unwrap_or(u32::MAX)))
    } else {
        bail!("Expected one of `action`, `input`, `layout` or `wait`")
    }
}

fn find(dom: &MemoryDom, selector: &str) -> Result<NodeId> {
    dom.query_selector(selector)?
        .ok_or_else(|| anyhow!("Selector `{}` matched nothing", selector))
}

fn to_input(dom: &MemoryDom, input: ScriptInput) -> Result<InputEvent<NodeId>> {
    Ok(match input {
        ScriptInput::PointerDown { target, x, y } => InputEvent::PointerDown {
            target: find(dom, &target)?,
            x,
            y,
        },
        ScriptInput::PointerMove { x, y } => InputEvent::PointerMove { x, y },
        ScriptInput::PointerUp { x, y } => InputEvent::PointerUp { x, y },
        ScriptInput::PointerOver { target, x, y } => InputEvent::PointerOver {
            target: find(dom, &target)?,
            x,
            y,
        },
        ScriptInput::PointerOut { target } => InputEvent::PointerOut {
            target: find(dom, &target)?,
        },
        ScriptInput::Click { target } => InputEvent::Click {
            target: find(dom, &target)?,
        },
        ScriptInput::KeyDown { key } => InputEvent::KeyDown { key },
        ScriptInput::Blur { target } => InputEvent::Blur {
            target: find(dom, &target)?,
        },
    })
}

fn label(step: &Step) -> String {
    match step {
        Step::Command(value) => value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Step::Input(input) => match input {
            ScriptInput::PointerDown { target, .. } => format!("pointerDown {}", target),
            ScriptInput::PointerMove { x, y } => format!("pointerMove {},{}", x, y),
            ScriptInput::PointerUp { x, y } => format!("pointerUp {},{}", x, y),
            ScriptInput::PointerOver { target, .. } => format!("pointerOver {}", target),
            ScriptInput::PointerOut { target } => format!("pointerOut {}", target),
            ScriptInput::Click { target } => format!("click {}", target),
            ScriptInput::KeyDown { key } => format!("keyDown {}", key),
            ScriptInput::Blur { target } => format!("blur {}", target),
        },
        Step::Layout(layout) => format!("layout {}", layout.layout),
        Step::Wait(ms) => format!("wait {}ms", ms),
    }
}

fn run_step(overlay: &mut Overlay<MemoryDom>, step: Step) -> Result<bool> {
    match step {
        Step::Command(mut value) => {
            let source = overlay.config().channel.host_source.clone();
            let fields = value
                .as_object_mut()
                .ok_or_else(|| anyhow!("A command must be an object"))?;
            fields.entry("source").or_insert(Value::String(source));
            if !overlay.handle_message(&value) {
                bail!("Command was not accepted");
            }
            Ok(false)
        }
        Step::Input(input) => {
            let input = to_input(overlay.tree(), input)?;
            Ok(overlay.handle_input(input).prevents_default())
        }
        Step::Layout(layout) => {
            let dom = overlay.tree_mut();
            let node = find(dom, &layout.layout)?;
            dom.set_rect(node, Rect::new(layout.x, layout.y, layout.width, layout.height));
            Ok(false)
        }
        Step::Wait(ms) => {
            if ms >= overlay.config().rollback_cue_ms && overlay.rollback_cue_pending() {
                overlay.clear_rollback_cue();
            }
            Ok(false)
        }
    }
}

/// Run every step of `script`, collecting the messages each one produced.
/// The `overlayReady` announcement is reported as line 0.
pub fn run_script(overlay: &mut Overlay<MemoryDom>, script: &str) -> Result<Vec<StepReport>> {
    let mut reports = vec![StepReport {
        line: 0,
        label: "attach".to_string(),
        prevented: false,
        messages: overlay.drain_messages(),
    }];

    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let number = index + 1;
        let step = parse_step(line).with_context(|| format!("line {}", number))?;
        let label = label(&step);
        let prevented = run_step(overlay, step).with_context(|| format!("line {}: {}", number, label))?;

        reports.push(StepReport {
            line: number,
            label,
            prevented,
            messages: overlay.drain_messages(),
        });
    }
    Ok(reports)
}

fn print_report(report: &StepReport) {
    let prevented = if report.prevented { " (default prevented)".dimmed().to_string() } else { String::new() };
    println!("{} {}{}", format!("{:>4}", report.line).dimmed(), report.label.bold(), prevented);

    for message in &report.messages {
        let action = message.get("action").and_then(Value::as_str).unwrap_or_default();
        let mut payload = message.clone();
        if let Some(fields) = payload.as_object_mut() {
            fields.remove("action");
            fields.remove("source");
        }
        let action = if action.ends_with("Failed") {
            action.red().bold()
        } else {
            action.green().bold()
        };
        println!("     {} {} {}", "→".cyan(), action, payload);
    }
}

pub fn replay(args: ReplayArgs, cwd: &str) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load(cwd)?,
    };

    let markup = fs::read_to_string(&args.fixture)
        .with_context(|| format!("Cannot read fixture {}", args.fixture.display()))?;
    let script = fs::read_to_string(&args.script)
        .with_context(|| format!("Cannot read script {}", args.script.display()))?;
    let dom = MemoryDom::from_markup(&markup).context("Cannot parse fixture")?;

    let mut overlay = Overlay::new(dom, config.overlay);
    let reports = run_script(&mut overlay, &script)?;

    if args.json {
        for message in reports.iter().flat_map(|r| &r.messages) {
            println!("{}", message);
        }
    } else {
        println!("▶️  {} {}", "Replaying".green().bold(), args.script.display());
        println!();
        for report in &reports {
            print_report(report);
        }
        println!();
        let total: usize = reports.iter().map(|r| r.messages.len()).sum();
        println!(
            "✨ {} {} steps, {} messages, mode {}",
            "Done".green().bold(),
            reports.len() - 1,
            total,
            overlay.session().mode()
        );
    }

    if args.dump {
        let dom = overlay.tree();
        if let Some(body) = dom.body() {
            println!();
            println!("{}", dom.inner_html(body));
        }
    }
    Ok(())
}
