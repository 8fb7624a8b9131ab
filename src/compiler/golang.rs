//! Go toolchain plan: `go mod init`, build, then `go test -v` when a test
//! half exists.

use super::SandboxPlan;

pub(super) fn plan(main_code: &str, test_code: &str) -> SandboxPlan {
    let mut files = vec![("main.go", main_code.to_string())];
    let script = if test_code.trim().is_empty() {
        "go mod init temp_module && go mod tidy && go build -o /dev/null ."
    } else {
        files.push(("main_test.go", test_code.to_string()));
        "go mod init temp_module && go mod tidy && go build -o /dev/null . && go test -v"
    };

    SandboxPlan {
        files,
        script: script.to_string(),
        main_file: "main.go",
    }
}
