//! Scripted metadata tool for unit tests.

use crate::exiftool::{MetadataTool, ToolOutput};
use std::ffi::OsString;
use std::io;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&[String]) -> ToolOutput + Send + Sync>;

/// Records every invocation and answers from a closure. Never touches files.
pub struct ScriptedTool {
    calls: Mutex<Vec<Vec<String>>>,
    respond: Responder,
}

impl ScriptedTool {
    pub fn new(respond: impl Fn(&[String]) -> ToolOutput + Send + Sync + 'static) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(|_| ok())
    }

    /// Fails every write whose target path contains `needle`.
    pub fn failing_on(needle: &'static str) -> Self {
        Self::new(move |args| {
            if args.last().is_some_and(|p| p.contains(needle)) {
                failed("Error: File format error\n")
            } else {
                ok()
            }
        })
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

impl MetadataTool for ScriptedTool {
    fn run(&self, args: &[OsString]) -> io::Result<ToolOutput> {
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        let output = (self.respond)(&args);
        self.calls.lock().unwrap().push(args);
        Ok(output)
    }
}

pub fn ok() -> ToolOutput {
    ToolOutput {
        exit_code: Some(0),
        output: "    1 image files updated\n".to_string(),
    }
}

pub fn failed(diagnostic: &str) -> ToolOutput {
    ToolOutput {
        exit_code: Some(1),
        output: diagnostic.to_string(),
    }
}
