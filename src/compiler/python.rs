//! Python plan: byte-compile both halves, then run unittest when a test
//! half exists, otherwise execute the main module.

use super::SandboxPlan;

pub(super) fn plan(main_code: &str, test_code: &str) -> SandboxPlan {
    let mut files = vec![("main.py", main_code.to_string())];
    let script = if test_code.trim().is_empty() {
        "python3 -m py_compile main.py && python3 main.py"
    } else {
        files.push(("test_main.py", test_code.to_string()));
        "python3 -m py_compile main.py test_main.py && python3 -m unittest -v test_main"
    };

    SandboxPlan {
        files,
        script: script.to_string(),
        main_file: "main.py",
    }
}
