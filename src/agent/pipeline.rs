//! The repository-to-code pipeline: four agents, their prompts and hand-offs.

use super::spec::{AgentSpec, Roster};
use crate::error::Result;

/// Literal whose presence in an agent's text ends the run.
pub const TERMINATION_SENTINEL: &str = "<<END>>";

pub const REPOSITORY_SEARCHER: &str = "Repository Searcher";
pub const REPOSITORY_CURATOR: &str = "Repository Curator";
pub const CODE_GENERATOR: &str = "Code Generator";
pub const REPOSITORY_PUBLISHER: &str = "Repository Publisher";

const SEARCHER_PROMPT: &str = "You are the Repository Searcher. Turn the user's request into \
GitHub search keywords and use query_for_github_repos (and get_readme when a description is \
unclear) to collect promising candidate repositories. When you have a candidate list, address \
the Repository Curator by name and include every repository URL in that message.";

const CURATOR_PROMPT: &str = "You are the Repository Curator. Inspect the candidate repositories \
you receive with get_readme, get_repo_tree and get_file_contents. Keep only repositories that \
are maintained, licensed for reuse and relevant to the user's request. If none qualify, address \
the Repository Searcher by name with better search keywords. Otherwise address the Code \
Generator by name with the shortlisted repositories and the files worth reusing.";

const GENERATOR_PROMPT: &str = "You are the Code Generator. Read the relevant files of the \
shortlisted repositories and write complete, working code that satisfies the user's request. \
When the code is finished, address the Repository Publisher by name and include the full code \
and a file name for it.";

const PUBLISHER_PROMPT: &str = "You are the Repository Publisher. Create a new repository with \
create_repo, then write the generated code with create_file, using append_to_file for content \
that does not fit in one call. When every file is uploaded, reply with the repository URL \
followed by <<END>>.";

/// Build the default four-agent roster.
///
/// Searcher → Curator; Curator → Searcher | Generator; Generator → Publisher;
/// Publisher has no successor and can only finish with the sentinel.
pub fn default_roster() -> Result<Roster> {
    Roster::new(vec![
        AgentSpec::new(REPOSITORY_SEARCHER, SEARCHER_PROMPT)
            .with_tools(["query_for_github_repos", "get_readme"])
            .with_successors([REPOSITORY_CURATOR]),
        AgentSpec::new(REPOSITORY_CURATOR, CURATOR_PROMPT)
            .with_tools(["get_readme", "get_repo_tree", "get_file_contents"])
            .with_successors([REPOSITORY_SEARCHER, CODE_GENERATOR]),
        AgentSpec::new(CODE_GENERATOR, GENERATOR_PROMPT)
            .with_tools(["get_repo_tree", "get_file_contents"])
            .with_successors([REPOSITORY_PUBLISHER]),
        AgentSpec::new(REPOSITORY_PUBLISHER, PUBLISHER_PROMPT)
            .with_tools(["create_repo", "create_file", "append_to_file"]),
    ])
}
