//! Globals provided by the PICO-8 runtime

/// Names that are defined before any cartridge code runs
pub const PICO8_GLOBALS: &[&str] = &[
    // graphics
    "camera", "circ", "circfill", "clip", "cls", "color", "cursor", "fget", "fillp", "flip", "fset",
    "line", "oval", "ovalfill", "pal", "palt", "pget", "print", "pset", "rect", "rectfill", "rrect",
    "rrectfill", "sget", "spr", "sset", "sspr", "tline",
    // map
    "map", "mapdraw", "mget", "mset",
    // input and audio
    "btn", "btnp", "music", "sfx",
    // memory
    "cstore", "memcpy", "memset", "peek", "peek2", "peek4", "poke", "poke2", "poke4", "reload",
    "serial",
    // math
    "abs", "atan2", "band", "bnot", "bor", "bxor", "ceil", "cos", "flr", "lshr", "max", "mid",
    "min", "rnd", "rotl", "rotr", "sgn", "shl", "shr", "sin", "sqrt", "srand",
    // tables and strings
    "add", "all", "chr", "count", "del", "deli", "foreach", "ipairs", "next", "ord", "pack",
    "pairs", "split", "sub", "tonum", "tostr", "unpack",
    // metatables and coroutines
    "cocreate", "coresume", "costatus", "getmetatable", "rawequal", "rawget", "rawlen", "rawset",
    "select", "setmetatable", "type", "yield",
    // system
    "assert", "cartdata", "dget", "dset", "extcmd", "holdframe", "load", "ls", "menuitem", "printh",
    "reset", "run", "stat", "stop", "t", "time", "trace",
    // environment
    "_ENV", "_G",
];

pub fn is_builtin(name: &str) -> bool {
    PICO8_GLOBALS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_builtin() {
        assert!(is_builtin("spr"));
        assert!(is_builtin("_ENV"));
        assert!(!is_builtin("player"));
    }
}
