//! Script pipeline
//!
//! Concatenates the configured source list in order (vendor library first,
//! then project code), parses the result with SWC, and emits a single
//! minified bundle at the configured ECMAScript target.
//!
//! Minification is whitespace/syntax level: identifiers are never renamed,
//! so code relying on class identity keeps working.

use std::fs;
use std::path::PathBuf;

use swc_common::comments::SingleThreadedComments;
use swc_common::errors::Handler;
use swc_common::sync::Lrc;
use swc_common::{FileName, Globals, Mark, SourceMap, GLOBALS};
use swc_ecma_ast::{EsVersion, Program};
use swc_ecma_codegen::text_writer::JsWriter;
use swc_ecma_codegen::Emitter;
use swc_ecma_parser::lexer::Lexer;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax};
use swc_ecma_transforms_base::fixer::fixer;
use swc_ecma_transforms_base::hygiene::hygiene;
use swc_ecma_transforms_base::resolver;
use swc_ecma_visit::FoldWith;

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::fs::atomic_write;
use crate::pipeline::PipelineResult;

/// Map a configured target name to an SWC `EsVersion`
pub fn parse_es_target(target: &str) -> Option<EsVersion> {
    match target.to_ascii_lowercase().as_str() {
        "es5" => Some(EsVersion::Es5),
        "es2015" | "es6" => Some(EsVersion::Es2015),
        "es2016" => Some(EsVersion::Es2016),
        "es2017" => Some(EsVersion::Es2017),
        "es2018" => Some(EsVersion::Es2018),
        "es2019" => Some(EsVersion::Es2019),
        "es2020" => Some(EsVersion::Es2020),
        "es2021" => Some(EsVersion::Es2021),
        "es2022" => Some(EsVersion::Es2022),
        "esnext" => Some(EsVersion::EsNext),
        _ => None,
    }
}

/// Parse, clean up and re-emit a concatenated bundle
pub fn bundle_scripts(
    source: &str,
    bundle_name: &str,
    target: EsVersion,
    minify: bool,
) -> KilnResult<String> {
    let script_err = |message: String| KilnError::Script {
        file: PathBuf::from(bundle_name),
        message,
    };

    let cm: Lrc<SourceMap> = Default::default();
    let handler = Handler::with_emitter_writer(Box::new(std::io::sink()), Some(cm.clone()));

    let fm = cm.new_source_file(
        Lrc::new(FileName::Custom(bundle_name.to_string())),
        source.to_string(),
    );

    let comments = SingleThreadedComments::default();
    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        target,
        StringInput::from(&*fm),
        Some(&comments),
    );

    let mut parser = Parser::new_from(lexer);

    let module = parser.parse_module().map_err(|e| {
        let kind = format!("{:?}", e.kind());
        e.into_diagnostic(&handler).emit();
        script_err(format!("failed to parse: {kind}"))
    })?;

    let errors: Vec<String> = parser
        .take_errors()
        .into_iter()
        .map(|e| format!("{:?}", e.kind()))
        .collect();
    if !errors.is_empty() {
        return Err(script_err(errors.join(", ")));
    }

    let module = GLOBALS.set(&Globals::default(), || {
        let unresolved_mark = Mark::new();
        let top_level_mark = Mark::new();

        let program = Program::Module(module)
            .fold_with(&mut resolver(unresolved_mark, top_level_mark, false));

        let module = match program {
            Program::Module(m) => m,
            Program::Script(s) => swc_ecma_ast::Module {
                span: s.span,
                body: s.body.into_iter().map(swc_ecma_ast::ModuleItem::Stmt).collect(),
                shebang: s.shebang,
            },
        };

        let module = module.fold_with(&mut hygiene());
        module.fold_with(&mut fixer(Some(&comments)))
    });

    let mut buf = Vec::new();
    {
        let writer = JsWriter::new(cm.clone(), "\n", &mut buf, None);
        let mut emitter = Emitter {
            cfg: swc_ecma_codegen::Config::default()
                .with_minify(minify)
                .with_target(target),
            cm: cm.clone(),
            comments: Some(&comments),
            wr: writer,
        };
        emitter
            .emit_module(&module)
            .map_err(|e| script_err(format!("failed to emit: {e}")))?;
    }

    String::from_utf8(buf).map_err(|e| script_err(format!("invalid UTF-8 output: {e}")))
}

/// Run the script pipeline
pub fn run(config: &Config) -> KilnResult<PipelineResult> {
    let mut result = PipelineResult::new();

    let target = parse_es_target(&config.scripts.target).ok_or(KilnError::InvalidTarget {
        target: config.scripts.target.clone(),
    })?;

    let mut combined = String::new();
    for source in &config.scripts.sources {
        let path = config.source_path(source);
        if !path.exists() {
            return Err(KilnError::MissingSource { path });
        }
        let code = fs::read_to_string(&path)?;
        combined.push_str(&code);
        if !combined.ends_with('\n') {
            combined.push('\n');
        }
    }

    let bundled = bundle_scripts(
        &combined,
        &config.scripts.bundle,
        target,
        config.scripts.minify,
    )?;

    let dest = config.out_path(PathBuf::from("js").join(&config.scripts.bundle));
    atomic_write(&dest, bundled.as_bytes())?;
    result.record_written(&dest);

    Ok(result)
}
