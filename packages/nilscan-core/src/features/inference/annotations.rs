//! In-source annotations and directives
//!
//! Two comment surfaces feed the inference engine: package documentation
//! directives (`<nilscan no inference>`, per-file experimental opt-ins) and
//! function doc annotations (`nilable(p, result)` / `nonnil(p)`) that pin
//! a site's value before any solving happens.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use nilscan_facts::{Nilability, SiteKey};

use crate::shared::models::{FileId, NilscanError, Package, Result};

/// Trigger absorption mode for one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    FullInfer,
    NoInfer,
}

#[derive(Debug, Clone, Default)]
pub struct PackageDirectives {
    pub mode: Mode,
    /// Files that opted into struct-initialization checking
    pub struct_init_files: FxHashSet<FileId>,
    /// Files that opted into anonymous-function analysis
    pub anon_func_files: FxHashSet<FileId>,
}

static DIRECTIVE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<nilscan ([^>]*)>").expect("static regex"));

/// Parse package-documentation directives. An unrecognized directive is a
/// fatal error for the package.
pub fn parse_directives(pkg: &Package) -> Result<PackageDirectives> {
    let mut out = PackageDirectives::default();
    for (file, lines) in &pkg.file_docs {
        for line in lines {
            for caps in DIRECTIVE_RE.captures_iter(line) {
                match caps[1].trim() {
                    "no inference" => out.mode = Mode::NoInfer,
                    "struct enable" => {
                        out.struct_init_files.insert(*file);
                    }
                    "anonymous function enable" => {
                        out.anon_func_files.insert(*file);
                    }
                    other => {
                        return Err(NilscanError::config(format!(
                            "invalid analysis mode directive `<nilscan {}>` in {}",
                            other,
                            pkg.files.name(*file)
                        )));
                    }
                }
            }
        }
    }
    Ok(out)
}

static NILABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnilable\(([^)]*)\)").expect("static regex"));
static NONNIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bnonnil\(([^)]*)\)").expect("static regex"));
static RESULT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^result(?: (\d+))?$").expect("static regex"));

/// Sites pinned by function doc comments.
pub fn syntactic_annotations(pkg: &Package) -> Vec<(SiteKey, Nilability)> {
    let mut out = Vec::new();
    for func in pkg.func_ids() {
        let info = pkg.func(func);
        for line in &info.doc {
            for (re, value) in [
                (&*NILABLE_RE, Nilability::Nilable),
                (&*NONNIL_RE, Nilability::Nonnil),
            ] {
                for caps in re.captures_iter(line) {
                    for name in caps[1].split(',') {
                        let name = name.trim();
                        if name.is_empty() {
                            continue;
                        }
                        if let Some(rcaps) = RESULT_RE.captures(name) {
                            let idx = rcaps
                                .get(1)
                                .and_then(|m| m.as_str().parse::<usize>().ok())
                                .unwrap_or(0);
                            if idx < info.num_results() {
                                out.push((pkg.result_site(func, idx), value));
                            }
                            continue;
                        }
                        if let Some(idx) = info
                            .params
                            .iter()
                            .position(|p| pkg.var(*p).name == name)
                        {
                            out.push((pkg.param_site(func, idx), value));
                        }
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::testkit::TestPkg;

    #[test]
    fn test_no_inference_directive() {
        let mut t = TestPkg::new("example.com/p");
        t.set_file_doc(&["Package p does things.", "<nilscan no inference>"]);
        let d = parse_directives(&t.pkg).unwrap();
        assert_eq!(d.mode, Mode::NoInfer);
    }

    #[test]
    fn test_experimental_opt_ins() {
        let mut t = TestPkg::new("example.com/p");
        t.set_file_doc(&["<nilscan struct enable>", "<nilscan anonymous function enable>"]);
        let d = parse_directives(&t.pkg).unwrap();
        assert!(d.struct_init_files.contains(&t.main_file));
        assert!(d.anon_func_files.contains(&t.main_file));
        assert_eq!(d.mode, Mode::FullInfer);
    }

    #[test]
    fn test_invalid_directive_is_fatal() {
        let mut t = TestPkg::new("example.com/p");
        t.set_file_doc(&["<nilscan warp speed>"]);
        let err = parse_directives(&t.pkg).unwrap_err();
        assert_eq!(err.kind, crate::shared::models::ErrorKind::Config);
    }

    #[test]
    fn test_function_annotations() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let q = t.param_var("q", ptr);
        let f = t.func("Load", &[p, q], &[ptr]);
        t.set_doc(f, &["Load fetches a row.", "nilable(p, result)", "nonnil(q)"]);

        let annos = syntactic_annotations(&t.pkg);
        assert!(annos.contains(&(t.pkg.param_site(f, 0), Nilability::Nilable)));
        assert!(annos.contains(&(t.pkg.result_site(f, 0), Nilability::Nilable)));
        assert!(annos.contains(&(t.pkg.param_site(f, 1), Nilability::Nonnil)));
    }

    #[test]
    fn test_contract_comment_is_not_an_annotation() {
        let mut t = TestPkg::new("example.com/p");
        let ptr = t.ty_ptr_int();
        let p = t.param_var("p", ptr);
        let f = t.func("pass", &[p], &[ptr]);
        t.set_doc(f, &["contract(nonnil -> nonnil)"]);
        assert!(syntactic_annotations(&t.pkg).is_empty());
    }
}
