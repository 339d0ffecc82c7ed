//! Rendering synthesized arguments as CMake cache definitions.

use crate::builder::arguments::Arguments;
use crate::core::argument::ArgumentValue;

/// Render one `-DKEY:TYPE=value` definition.
pub fn define(key: &str, value: &ArgumentValue) -> String {
    let ty = match value {
        ArgumentValue::Bool(_) => "BOOL",
        ArgumentValue::String(_) | ArgumentValue::List(_) => "STRING",
        ArgumentValue::Path(_) => "PATH",
    };
    format!("-D{}:{}={}", key, ty, value)
}

/// Render every argument, in order.
pub fn cmake_args(args: &Arguments) -> Vec<String> {
    args.iter().map(|(key, value)| define(key, value)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_types() {
        assert_eq!(define("VISTLE_USE_CUDA", &ArgumentValue::Bool(false)), "-DVISTLE_USE_CUDA:BOOL=OFF");
        assert_eq!(
            define("CMAKE_BUILD_TYPE", &ArgumentValue::from("Release")),
            "-DCMAKE_BUILD_TYPE:STRING=Release"
        );
        assert_eq!(
            define(
                "CMAKE_HIP_ARCHITECTURES",
                &ArgumentValue::List(vec!["gfx1030".to_string(), "gfx90a".to_string()])
            ),
            "-DCMAKE_HIP_ARCHITECTURES:STRING=gfx1030;gfx90a"
        );
        assert_eq!(
            define("CMAKE_CXX_COMPILER", &ArgumentValue::Path("/opt/rocm/bin/hipcc".to_string())),
            "-DCMAKE_CXX_COMPILER:PATH=/opt/rocm/bin/hipcc"
        );
    }

    #[test]
    fn test_cmake_args_in_order() {
        let mut args = Arguments::new();
        args.insert("B", ArgumentValue::Bool(true));
        args.insert("A", ArgumentValue::from("x"));
        assert_eq!(cmake_args(&args), vec!["-DB:BOOL=ON", "-DA:STRING=x"]);
    }
}
