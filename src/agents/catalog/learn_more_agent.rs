//! The learn-more agent answers questions about Flowstate and 8ly from
//! the project documents

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, Mutex};

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::parse_args;
use crate::agents::core::AgentCore;
use crate::agents::definition::{no_parameters, parameters_of, AgentDefinition};
use crate::agents::dispatch::ProgressReporter;
use crate::agents::llm::ModelClient;
use crate::domain::User;

const SYSTEM_PROMPT: &str = r#"You don't have a name, you are an authoritative representative of our company, 8ly, our first app, Flowstate, and
me, Zech, the founder.

Your purpose is to communicate the goals and values of 8ly and the value of Flowstate to investors and potential
co-founders. You're also tasked with discussing the prototype's codebase with the goal of demonstrating the
feasibility of the project using existing technologies and putting the user at ease that we understand what to do.
Make your messages as clear and scannable as possible. Review the project's README file before addressing
questions about the codebase.

Use tools to look up all relevant documents to help you answer any questions the user may have. If the user asks
technical questions about how the Flowstate prototype functions, you can look through the relevant code files.
These documents are your understanding, don't refer to them as documents.

BE AWARE:
The code is solely intended for demonstration purposes. It is not intended for production use. The actual finished
version of Flowstate is not yet created. The code you have access to is ONLY for the prototype and IS NOT
representative of the actual version that is coming. When discussing the prototype's code, focus on the
technologies and the patterns used.

Guidelines:
- Never refer to yourself as an AI, agent, or assistant.
- Don't talk about Flowstate as an app, use the name Flowstate instead.
- Respond and act in a way that feels intuitive, supportive, and innately human.
- When the user goes off-topic, redirect them back to discuss Flowstate and 8ly.
- Don't overuse the user's name, it's ok occasionally.
- Don't refer to yourself or the company in the first person.
- If the documents don't have a clear answer for the user's question, offer a generic answer with a probable
expectation.
- When sharing links, use markdown link formatting.

ALWAYS surface information relevant to the user's question to avoid the need for followup questions.
ALWAYS validate technical answers against the codebase.

Whatever you do: NEVER EVER make anything up. All necessary information is available in the documents."#;

/// What the learn-more agent's tools need
pub struct LearnMoreDeps {
    root: PathBuf,
    file_cache: Mutex<HashMap<String, String>>,
    listing_cache: Mutex<Option<Vec<String>>>,
}

impl LearnMoreDeps {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            file_cache: Mutex::new(HashMap::new()),
            listing_cache: Mutex::new(None),
        }
    }

    /// The README shown as the opening reply of the learn-more chat
    pub fn readme(&self) -> String {
        std::fs::read_to_string(self.root.join("README.md")).unwrap_or_else(|_| {
            "Flowstate is a human-first task management tool from 8ly. Ask me anything about it."
                .to_string()
        })
    }

    fn files(&self) -> Vec<String> {
        if let Some(listing) = self.listing_cache.lock().unwrap().as_ref() {
            return listing.clone();
        }

        let mut files = Vec::new();
        collect_files(&self.root, &self.root, &mut files);
        files.sort();
        *self.listing_cache.lock().unwrap() = Some(files.clone());
        files
    }
}

/// Recursively gather relative paths, skipping hidden entries
fn collect_files(root: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        if path.is_dir() {
            collect_files(root, &path, out);
        } else if let Ok(relative) = path.strip_prefix(root) {
            out.push(relative.to_string_lossy().replace('\\', "/"));
        }
    }
}

static DEFINITION: LazyLock<AgentDefinition<LearnMoreDeps>> = LazyLock::new(|| {
    AgentDefinition::builder("learn_more", SYSTEM_PROMPT)
        .labeled_tool(
            "Listing files",
            "list_files",
            "Activate this tool whenever you need to know what documents are available to you \
             to answer the user's questions.",
            no_parameters(),
            |deps, args| async move { list_files(deps, args).await },
        )
        .labeled_tool(
            "Reading {file_path}",
            "read_file",
            "Activate this tool whenever you need to read a document. Use the file path to \
             locate the file. If the file doesn't exist, you'll get an error message back.",
            parameters_of::<ReadFileArgs>(),
            |deps, args| async move { read_file(deps, args).await },
        )
        .tool(
            "create_github_link",
            "Creates a link to the file on GitHub.",
            parameters_of::<GithubLinkArgs>(),
            |deps, args| async move { create_github_link(deps, args).await },
        )
        .build()
        .expect("learn-more agent definition is valid")
});

/// Build a live learn-more agent for one connection
pub fn learn_more_agent(
    model: Arc<dyn ModelClient>,
    deps: Arc<LearnMoreDeps>,
    user: Option<&User>,
    reporter: Option<ProgressReporter>,
) -> AgentCore<LearnMoreDeps> {
    let mut prompt = SYSTEM_PROMPT.to_string();
    if let Some(user) = user {
        prompt.push_str(&format!(
            "\n\nThe user is currently logged in as {}. Use the user's name from time to time, \
             as is appropriate.\n\n",
            user.username
        ));
    }
    AgentCore::with_prompt(&DEFINITION, model, deps, reporter, prompt)
}

#[derive(Deserialize, JsonSchema)]
struct ReadFileArgs {
    /// Path of the document, relative to the project root
    file_path: String,
}

#[derive(Deserialize, JsonSchema)]
struct GithubLinkArgs {
    file_path: String,
}

async fn list_files(deps: Arc<LearnMoreDeps>, _args: Value) -> anyhow::Result<Value> {
    Ok(json!(deps.files()))
}

async fn read_file(deps: Arc<LearnMoreDeps>, args: Value) -> anyhow::Result<Value> {
    let args: ReadFileArgs = parse_args(args)?;

    if let Some(cached) = deps.file_cache.lock().unwrap().get(&args.file_path) {
        return Ok(json!(cached));
    }

    if !deps.files().contains(&args.file_path) {
        return Ok(json!(format!(
            "Access denied: File {} not found.",
            args.file_path
        )));
    }

    let content = std::fs::read_to_string(deps.root.join(&args.file_path))?;
    deps.file_cache
        .lock()
        .unwrap()
        .insert(args.file_path, content.clone());
    Ok(json!(content))
}

async fn create_github_link(_deps: Arc<LearnMoreDeps>, args: Value) -> anyhow::Result<Value> {
    let args: GithubLinkArgs = parse_args(args)?;
    Ok(json!(format!(
        "https://github.com/8ly-dev/flowstate-prototype/blob/main/{}",
        args.file_path
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn docs() -> (tempfile::TempDir, Arc<LearnMoreDeps>) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("README.md"), "# Flowstate\nHuman-first tasks.").unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/pitch.md"), "We raise on warmth.").unwrap();
        fs::write(dir.path().join(".secret"), "hidden").unwrap();
        let deps = Arc::new(LearnMoreDeps::new(dir.path().to_path_buf()));
        (dir, deps)
    }

    #[tokio::test]
    async fn lists_visible_files_only() {
        let (_dir, deps) = docs();
        let listing = list_files(deps, json!({})).await.unwrap();
        let listing: Vec<String> = serde_json::from_value(listing).unwrap();
        assert_eq!(listing, vec!["README.md", "notes/pitch.md"]);
    }

    #[tokio::test]
    async fn reads_known_files_and_refuses_unknown_paths() {
        let (_dir, deps) = docs();

        let content = read_file(deps.clone(), json!({ "file_path": "notes/pitch.md" }))
            .await
            .unwrap();
        assert_eq!(content, json!("We raise on warmth."));

        let denied = read_file(deps.clone(), json!({ "file_path": "../etc/passwd" }))
            .await
            .unwrap();
        assert!(denied.as_str().unwrap().starts_with("Access denied"));

        let hidden = read_file(deps, json!({ "file_path": ".secret" })).await.unwrap();
        assert!(hidden.as_str().unwrap().starts_with("Access denied"));
    }

    #[tokio::test]
    async fn readme_falls_back_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let deps = LearnMoreDeps::new(dir.path().to_path_buf());
        assert!(deps.readme().contains("Flowstate"));
    }
}
