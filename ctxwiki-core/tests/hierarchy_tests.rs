// tests/hierarchy_tests.rs
// Workspace-root detection, the once-only monorepo question, and context paths.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use tempfile::TempDir;

use ctxwiki_core::config::{ClassifyConfig, WorkspaceConfig};
use ctxwiki_core::services::hierarchy::{
    find_workspace_root, workspace_of, ClassificationPrompt, FixedAnswer, HierarchyResolver,
};
use ctxwiki_core::services::locate::{Classification, PathClassifier};
use ctxwiki_core::services::state::StateStore;
use ctxwiki_core::utils::FixedClock;

struct Layout {
    _tmp: TempDir,
    base: PathBuf,
    mono: PathBuf,
    api_src: PathBuf,
}

fn layout() -> Layout {
    let tmp = TempDir::new().expect("tempdir");
    let base = tmp.path().canonicalize().expect("canonicalize");
    let mono = base.join("mono");
    let api_src = mono.join("packages").join("api").join("src");
    fs::create_dir_all(&api_src).expect("mkdir");
    fs::create_dir_all(mono.join("tools").join("gen")).expect("mkdir");
    fs::write(mono.join("pnpm-workspace.yaml"), "packages:\n  - packages/*\n").expect("marker");
    Layout {
        _tmp: tmp,
        base,
        mono,
        api_src,
    }
}

fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().expect("ts"))
}

#[test]
fn finds_nearest_marker_walking_upward() {
    let l = layout();
    let cfg = WorkspaceConfig::default();

    let found = find_workspace_root(&l.api_src, &cfg).expect("root");
    assert_eq!(found.path, l.mono);
    assert_eq!(found.marker, "pnpm-workspace.yaml");

    assert_eq!(
        workspace_of(&l.mono, &l.api_src, &cfg),
        Some(Path::new("packages").join("api"))
    );
    assert_eq!(workspace_of(&l.mono, &l.mono, &cfg), None);
    assert_eq!(workspace_of(&l.mono, &l.mono.join("tools").join("gen"), &cfg), None);
}

#[test]
fn custom_workspace_dirs_are_recognized() {
    let l = layout();
    let cfg = WorkspaceConfig {
        custom_dirs: vec!["tools".into()],
        ..WorkspaceConfig::default()
    };
    assert_eq!(
        workspace_of(&l.mono, &l.mono.join("tools").join("gen"), &cfg),
        Some(Path::new("tools").join("gen"))
    );
}

#[test]
fn asks_once_per_root_and_persists_the_answer() {
    let l = layout();
    let cfg = WorkspaceConfig::default();
    let db = l.base.join("state.db");
    let clock = clock();

    let yes = FixedAnswer::new(true);
    {
        let state = StateStore::open(&db).expect("state");
        let resolver = HierarchyResolver::new(&cfg, &state, &yes, &clock);

        let first = resolver.resolve(&l.api_src).expect("resolve");
        assert_eq!(first.root, l.mono);
        assert_eq!(first.workspace, Some(Path::new("packages").join("api")));
        assert!(first.binding.as_ref().map(|b| b.is_monorepo).unwrap_or(false));

        resolver.resolve(&l.api_src).expect("resolve again");
        assert_eq!(yes.asked(), 1);
    }

    // New process: the stored binding wins over whatever the prompt would say.
    let state = StateStore::open(&db).expect("reopen");
    let no = FixedAnswer::new(false);
    let resolver = HierarchyResolver::new(&cfg, &state, &no, &clock);
    let again = resolver.resolve(&l.api_src).expect("resolve");
    assert_eq!(no.asked(), 0);
    assert!(again.is_pair());
}

#[test]
fn declined_root_updates_only_the_root_wiki() {
    let l = layout();
    let cfg = WorkspaceConfig::default();
    let state = StateStore::in_memory().expect("state");
    let no = FixedAnswer::new(false);
    let clock = clock();

    let r = HierarchyResolver::new(&cfg, &state, &no, &clock)
        .resolve(&l.api_src)
        .expect("resolve");
    assert_eq!(r.root, l.mono);
    assert_eq!(r.workspace, None);
    assert_eq!(no.asked(), 1);

    let classifier = PathClassifier::with_home(&ClassifyConfig::default(), Some(l.base.clone()));
    assert_eq!(r.targets(&classifier, Path::new("/ctx")).len(), 1);
}

/// Answers nothing, or fails, the way a prompt without a terminal would.
struct NoAnswer {
    fail: bool,
}

impl ClassificationPrompt for NoAnswer {
    fn is_monorepo(&self, _root: &Path, _workspace: &Path) -> anyhow::Result<Option<bool>> {
        if self.fail {
            anyhow::bail!("stdin closed");
        }
        Ok(None)
    }
}

#[test]
fn unanswered_question_is_not_persisted() {
    let l = layout();
    let cfg = WorkspaceConfig::default();
    let state = StateStore::in_memory().expect("state");
    let clock = clock();

    let silent = NoAnswer { fail: false };
    let r = HierarchyResolver::new(&cfg, &state, &silent, &clock)
        .resolve(&l.api_src)
        .expect("resolve");
    assert_eq!(r.root, l.mono);
    assert!(r.workspace.is_none() && r.binding.is_none());
    assert!(state.binding(&l.mono).expect("lookup").is_none());

    let failing = NoAnswer { fail: true };
    assert!(HierarchyResolver::new(&cfg, &state, &failing, &clock)
        .resolve(&l.api_src)
        .is_err());
    assert!(state.binding(&l.mono).expect("lookup").is_none());

    // a later run with someone to ask still gets the question
    let yes = FixedAnswer::new(true);
    let r = HierarchyResolver::new(&cfg, &state, &yes, &clock)
        .resolve(&l.api_src)
        .expect("resolve");
    assert_eq!(yes.asked(), 1);
    assert!(r.is_pair());
}

#[test]
fn no_marker_means_the_directory_is_its_own_project() {
    let l = layout();
    let plain = l.base.join("plain");
    fs::create_dir_all(&plain).expect("mkdir");
    let cfg = WorkspaceConfig::default();
    let state = StateStore::in_memory().expect("state");
    let prompt = FixedAnswer::new(true);
    let clock = clock();

    let r = HierarchyResolver::new(&cfg, &state, &prompt, &clock)
        .resolve(&plain)
        .expect("resolve");
    assert_eq!(r.root, plain);
    assert!(r.workspace.is_none() && r.binding.is_none());

    // Standing at the monorepo root itself is not a workspace either.
    let r = HierarchyResolver::new(&cfg, &state, &prompt, &clock)
        .resolve(&l.mono)
        .expect("resolve");
    assert!(r.workspace.is_none());
    assert_eq!(prompt.asked(), 0);
}

#[test]
fn pair_targets_mirror_the_source_tree() {
    let l = layout();
    let cfg = WorkspaceConfig::default();
    let state = StateStore::in_memory().expect("state");
    let yes = FixedAnswer::new(true);
    let clock = clock();
    let r = HierarchyResolver::new(&cfg, &state, &yes, &clock)
        .resolve(&l.api_src)
        .expect("resolve");

    let classifier = PathClassifier::with_home(&ClassifyConfig::default(), Some(l.base.clone()));
    let ctx = Path::new("/ctx");
    let targets = r.targets(&classifier, ctx);

    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0].label, "root");
    assert_eq!(targets[0].identity(), "personal/mono");
    assert_eq!(targets[0].wiki_path, ctx.join("personal/mono/context.md"));
    assert_eq!(targets[1].label, "workspace:packages/api");
    assert_eq!(targets[1].identity(), "personal/mono/packages/api");
    assert_eq!(
        targets[1].architecture_path,
        ctx.join("personal/mono/packages/api/architecture.md")
    );
}

// ---------- path classification ----------

fn classifier() -> PathClassifier {
    let cfg = ClassifyConfig {
        work_path_patterns: vec!["~/work".into()],
        personal_path_patterns: vec!["~/code".into()],
        excluded_paths: vec!["~/secret".into()],
    };
    PathClassifier::with_home(&cfg, Some(PathBuf::from("/home/u")))
}

#[test]
fn classifies_by_component_prefix() {
    let c = classifier();
    assert_eq!(c.classify(Path::new("/home/u/work/acme/api")), Classification::Work);
    assert_eq!(c.classify(Path::new("/home/u/workshop/x")), Classification::Personal);
    assert!(c.is_excluded(Path::new("/home/u/secret/notes")));
    assert!(!c.is_excluded(Path::new("/home/u/secretive")));
}

#[test]
fn relative_path_fallbacks() {
    let c = classifier();
    let loc = c.locate(Path::new("/home/u/work/acme/api"));
    assert_eq!(loc.identity(), "work/acme/api");

    assert_eq!(c.locate(Path::new("/home/u/code/blog")).identity(), "personal/blog");
    // under $HOME with a leading classification segment
    assert_eq!(c.locate(Path::new("/home/u/personal/site")).identity(), "personal/site");
    assert_eq!(c.locate(Path::new("/home/u/misc/tool")).identity(), "personal/misc/tool");
    // outside $HOME: last two segments
    assert_eq!(c.locate(Path::new("/srv/projects/x")).identity(), "personal/projects/x");
    // the pattern directory itself
    assert_eq!(c.locate(Path::new("/home/u/work")).identity(), "work/work");
}
