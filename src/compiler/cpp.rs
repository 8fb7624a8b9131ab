//! C++ plan: build each half separately (both carry their own `main`), run
//! the test binary when present, otherwise the main binary.

use super::SandboxPlan;

pub(super) fn plan(main_code: &str, test_code: &str) -> SandboxPlan {
    let mut files = vec![("main.cpp", main_code.to_string())];
    let script = if test_code.trim().is_empty() {
        "g++ -std=c++17 -o main_bin main.cpp && ./main_bin"
    } else {
        files.push(("test_main.cpp", test_code.to_string()));
        "g++ -std=c++17 -o main_bin main.cpp && g++ -std=c++17 -o test_bin test_main.cpp && ./test_bin"
    };

    SandboxPlan {
        files,
        script: script.to_string(),
        main_file: "main.cpp",
    }
}
