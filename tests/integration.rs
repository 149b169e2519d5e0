use std::path::Path;
use std::process::{Command, Output};

fn mdxref_cmd(fixture: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mdxref"));
    cmd.current_dir(Path::new("tests/fixtures").join(fixture));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn render_notebook_numbers_labels_and_citations() {
    let out = mdxref_cmd("notebook").args(["render", "paper.ipynb"]).output().unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));
    let text = stdout(&out);

    assert!(
        text.starts_with("# Heat flow\n\nSection 1 derives equation (1); the approach follows [1].\n\n## 1. Model"),
        "unexpected head:\n{text}"
    );
    assert!(text.contains("Equation 1.\n\n$$\nu_t = \\alpha u_{xx}\n$$"), "math altered:\n{text}");
    assert!(text.contains("Solved numerically as in [2], see also [1]."), "citations wrong:\n{text}");
    assert!(
        text.contains("```\nu = solve(alpha=0.1)  # @not-a-label\n```"),
        "code cell not fenced verbatim:\n{text}"
    );
    assert!(
        text.contains("## References\n\n1. Joseph Fourier. 1822. The Analytical Theory of Heat. (1822).\n\n2. John Crank, Phyllis Nicolson. 1947."),
        "reference list wrong:\n{text}"
    );
    assert!(text.contains("*Mathematical Proceedings of the Cambridge Philosophical Society* **43**, 1 (1947), 50--67."));
    assert!(!text.contains(":::"), "bibliography block left behind:\n{text}");
    assert!(
        !Path::new("tests/fixtures/notebook/.mdxref.cache").exists(),
        "cache written although disabled"
    );
}

#[test]
fn render_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.md");
    let out = mdxref_cmd("chapters")
        .args(["render", "."])
        .arg("-o")
        .arg(&target)
        .output()
        .unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));
    assert!(stdout(&out).is_empty(), "rendered text leaked to stdout");

    let text = std::fs::read_to_string(&target).unwrap();
    assert_eq!(
        text,
        "# 1. Introduction\n\n\
         Figure 1 shows the pipeline described in section 2.\n\n\
         # 2. Method\n\n\
         ![Pipeline](pipeline.png)\n\n\
         Figure 1. The pipeline.\n\n\
         Figure 2. Results, discussed in section 1.\n"
    );
}

#[test]
fn check_clean_document_passes() {
    let out = mdxref_cmd("chapters").args(["check", "."]).output().unwrap();
    assert!(out.status.success(), "check failed: {}{}", stdout(&out), stderr(&out));
    assert!(stdout(&out).contains("All 4 labels defined once"), "got {}", stdout(&out));
}

#[test]
fn check_reports_duplicates_and_undefined() {
    let out = mdxref_cmd("duplicates").args(["check", "doc.md"]).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let text = stdout(&out);
    assert!(text.contains("DUPLICATE  setup"), "got {text}");
    assert!(text.contains("UNDEFINED  missing (doc.md)"), "got {text}");
    assert!(!text.contains("UNDEFINED  setup"), "duplicate reported as undefined: {text}");
}

#[test]
fn render_marks_duplicates_and_undefined_in_band() {
    let out = mdxref_cmd("duplicates").args(["render", "doc.md"]).output().unwrap();
    assert!(out.status.success(), "render failed: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("# ⚠️ {duplicate: setup}. Setup again"), "got {text}");
    assert!(text.contains("See ⚠️ {duplicate: setup} and ⚠️ {undefined: missing}."), "got {text}");
}

#[test]
fn scan_json_groups_labels() {
    let out = mdxref_cmd("chapters").args(["scan", ".", "--json"]).output().unwrap();
    assert!(out.status.success(), "scan failed: {}", stderr(&out));
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();

    let groups: Vec<&String> = report["labels"].as_object().unwrap().keys().collect();
    assert_eq!(groups, ["", "fig"]);
    assert_eq!(report["labels"]["fig"][1]["key"], "fig:results");
    assert_eq!(report["labels"]["fig"][1]["number"], 2);
    assert_eq!(report["labels"][""][1]["unit"], "02-method.md");
    assert_eq!(report["duplicates"].as_array().unwrap().len(), 0);
}

#[test]
fn scan_lists_citation_order() {
    let out = mdxref_cmd("notebook").args(["scan", "paper.ipynb"]).output().unwrap();
    assert!(out.status.success(), "scan failed: {}", stderr(&out));
    let text = stdout(&out);
    assert!(text.contains("## citations\n   1  fourier1822\n   2  crank1947"), "got {text}");
    assert!(text.contains("## eq\n   1  eq:heat  (model)"), "got {text}");
}

#[test]
fn missing_document_is_a_runtime_error() {
    let out = mdxref_cmd("chapters").args(["check", "nope.ipynb"]).output().unwrap();
    assert_eq!(out.status.code(), Some(3));
    assert!(stderr(&out).contains("Error: Document Not Found"), "got {}", stderr(&out));
}
