//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Scholar CLI.

use owo_colors::OwoColorize;
use scholar::research::{ProcessingStatus, StepDetail};
use scholar::types::{MessageRole, Recommendation, RecommendationType, Source, SourceType, Turn};
use std::io::{self, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Scholar banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n   {} {}\n",
                "scholar".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!("\n   scholar v{}\n", env!("CARGO_PKG_VERSION"));
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a directory creation message
    pub fn created_dir(&self, path: &str) {
        self.created("directory", path);
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    /// Print completion message
    pub fn complete(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.bright_green().bold());
        } else {
            println!("\n  [DONE] {}", message);
        }
    }

    /// Print the prompt for the interactive session without a newline
    pub fn prompt(&self) {
        if self.colored {
            print!("\n{} ", "you ›".bright_cyan().bold());
        } else {
            print!("\nyou> ");
        }
        io::stdout().flush().ok();
    }

    /// Print an answer body
    pub fn answer(&self, text: &str) {
        println!();
        for line in text.lines() {
            println!("  {}", line);
        }
    }

    /// Print one stored turn with its speaker and time
    pub fn turn(&self, turn: &Turn) {
        let speaker = match turn.role {
            MessageRole::User => "you",
            MessageRole::Assistant => "scholar",
            MessageRole::System => "system",
        };
        let when = turn.created_at.format("%Y-%m-%d %H:%M").to_string();
        if self.colored {
            println!("\n  {} {}", speaker.bright_cyan().bold(), when.dimmed());
        } else {
            println!("\n  {} ({})", speaker, when);
        }
        for line in turn.content.lines() {
            println!("    {}", line);
        }
    }

    /// Print numbered sources
    pub fn sources(&self, sources: &[Source]) {
        if sources.is_empty() {
            return;
        }
        self.subheader("Sources");
        for (i, source) in sources.iter().enumerate() {
            let tag = match source.source_type {
                SourceType::Academic => "paper",
                SourceType::Web => "web",
            };
            if self.colored {
                println!(
                    "    {} {} {}",
                    format!("[{}]", i + 1).bright_white().bold(),
                    source.title,
                    format!("({})", tag).dimmed()
                );
                println!("        {}", source.url.blue().underline());
            } else {
                println!("    [{}] {} ({})", i + 1, source.title, tag);
                println!("        {}", source.url);
            }
            if let Some(authors) = &source.authors {
                println!("        {}", authors.join(", "));
            }
        }
    }

    /// Print follow-up suggestions
    pub fn recommendations(&self, recommendations: &[Recommendation]) {
        if recommendations.is_empty() {
            return;
        }
        self.subheader("You might also explore");
        for rec in recommendations {
            let kind = match rec.kind {
                RecommendationType::Topic => "topic",
                RecommendationType::Concept => "concept",
                RecommendationType::ResearchArea => "research area",
            };
            if self.colored {
                println!(
                    "    {} {} {}",
                    "•".blue(),
                    rec.title.bright_white(),
                    format!("[{} {:.2}]", kind, rec.relevance_score).dimmed()
                );
                println!("      {}", rec.description.dimmed());
            } else {
                println!("    - {} [{} {:.2}]", rec.title, kind, rec.relevance_score);
                println!("      {}", rec.description);
            }
        }
    }

    /// One-line progress update
    pub fn progress(&self, status: &ProcessingStatus) {
        let label = status
            .current_step
            .map(|step| step.label())
            .unwrap_or("Working");
        if self.colored {
            eprintln!(
                "  {} {}",
                format!("[{:>3}%]", status.progress_percent).dimmed(),
                label.dimmed()
            );
        } else {
            eprintln!("  [{:>3}%] {}", status.progress_percent, label);
        }
    }

    /// Print the finished processing status step by step
    pub fn status(&self, status: &ProcessingStatus) {
        self.subheader("Processing");
        self.kv(
            "progress",
            &format!(
                "{}/{} steps ({}%)",
                status.steps_completed.len(),
                status.steps_total,
                status.progress_percent
            ),
        );
        for step in &status.steps_completed {
            let Some(record) = status.detailed_status.get(step) else {
                continue;
            };
            let summary = describe(&record.detail);
            let line = format!(
                "{:<28} {:>6}ms  {}",
                step.as_str(),
                record.elapsed_ms,
                summary
            );
            self.list_item(&line);
        }
        if let Some(error) = &status.error {
            self.error(error);
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<18}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 19).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 19));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<18}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }
}

/// Short human summary of a step record.
pub fn describe(detail: &StepDetail) -> String {
    match detail {
        StepDetail::AnalyzingIntent { history_turns } => {
            format!("{} prior turns", history_turns)
        }
        StepDetail::IntentAnalyzed { intent, route } => {
            format!("{} ({:?})", intent.conversation_type, route)
        }
        StepDetail::Planning { available_agents } => {
            format!("{} agents available", available_agents.len())
        }
        StepDetail::PlanGenerated { plan } => {
            let agents: Vec<&str> = plan.steps.iter().map(|s| s.agent.as_str()).collect();
            let suffix = if plan.fallback { ", default plan" } else { "" };
            format!("{}{}", agents.join(", "), suffix)
        }
        StepDetail::Executing {
            step_count,
            concurrency,
        } => format!("{} steps, {} at a time", step_count, concurrency),
        StepDetail::ExecutionCompleted {
            result_count,
            agents,
            ..
        } => {
            let ok = agents.iter().filter(|a| a.error.is_none()).count();
            format!("{} results, {}/{} steps ok", result_count, ok, agents.len())
        }
        StepDetail::Synthesizing { source_count } => format!("{} sources", source_count),
        StepDetail::GeneratingRecommendations {
            recommendation_count,
            fallback,
        } => {
            let suffix = if *fallback { " (fallback)" } else { "" };
            format!("{} suggestions{}", recommendation_count, suffix)
        }
        StepDetail::ResponseReady { answer_chars } => format!("{} chars", answer_chars),
        StepDetail::Completed { outcome } => format!("{:?}", outcome),
    }
}
