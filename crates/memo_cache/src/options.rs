//! Layered cache configuration.
//!
//! Three layers feed every call: options passed with the call, options fixed
//! when the function was wrapped, and [`GlobalDefaults`]. The first layer that
//! sets a value wins. A [`CacheDirProvider`] passed with the call (typically
//! the object owning a memoized method) overrides the directory of all three.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use memo_config::{CacheConfig, WriteModeSetting};

use crate::backend::{ReadPolicy, WriteMode};
use crate::error::CacheError;
use crate::format::{CacheFormat, Compression, FormatSpec};

/// Something that knows which cache directory to use.
pub trait CacheDirProvider {
    /// The directory, or `None` to fall back to the option layers.
    fn cache_dir(&self) -> Option<&Path>;
}

impl CacheDirProvider for Path {
    fn cache_dir(&self) -> Option<&Path> {
        Some(self)
    }
}

impl CacheDirProvider for PathBuf {
    fn cache_dir(&self) -> Option<&Path> {
        Some(self)
    }
}

/// A transform applied to a result before it is returned.
pub enum Transform<T> {
    /// Return the value unchanged.
    Identity,
    /// Return `f(value)`.
    Apply(Arc<dyn Fn(T) -> T + Send + Sync>),
}

impl<T> Transform<T> {
    /// Wraps a closure.
    pub fn new(f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        Transform::Apply(Arc::new(f))
    }

    /// Applies the transform.
    pub fn apply(&self, value: T) -> T {
        match self {
            Transform::Identity => value,
            Transform::Apply(f) => f(value),
        }
    }
}

impl<T> Default for Transform<T> {
    fn default() -> Self {
        Transform::Identity
    }
}

impl<T> Clone for Transform<T> {
    fn clone(&self) -> Self {
        match self {
            Transform::Identity => Transform::Identity,
            Transform::Apply(f) => Transform::Apply(Arc::clone(f)),
        }
    }
}

impl<T> fmt::Debug for Transform<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => f.write_str("Identity"),
            Transform::Apply(_) => f.write_str("Apply(..)"),
        }
    }
}

/// Process-wide defaults, the lowest configuration layer.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDefaults {
    /// Cache directory; `None` disables caching unless a higher layer sets one.
    pub cachedir: Option<PathBuf>,
    /// Serialization format.
    pub format: CacheFormat,
    /// Whether files are gzip-compressed.
    pub compression: bool,
    /// Suppress informational diagnostics.
    pub quiet: bool,
    /// Hash call arguments into the file name.
    pub include_args: bool,
    /// Give unhashable arguments a sentinel hash instead of failing.
    pub ignore_unhashable: bool,
    /// Spread signed entries over shard directories.
    pub shard: bool,
    /// How files are written.
    pub write_mode: WriteMode,
    /// What to do with undecodable files.
    pub read_policy: ReadPolicy,
}

impl Default for GlobalDefaults {
    fn default() -> Self {
        Self {
            cachedir: None,
            format: CacheFormat::Json,
            compression: true,
            quiet: false,
            include_args: false,
            ignore_unhashable: false,
            shard: false,
            write_mode: WriteMode::Direct,
            read_policy: ReadPolicy::Fail,
        }
    }
}

impl GlobalDefaults {
    /// Builds defaults from the `[cache]` section of `memo.toml`.
    ///
    /// Relative directories are kept relative, i.e. resolved against the
    /// working directory at call time.
    pub fn from_config(config: &CacheConfig) -> Result<Self, CacheError> {
        Ok(Self {
            cachedir: config.dir.as_ref().map(PathBuf::from),
            format: config.format.parse()?,
            compression: config.compression,
            quiet: config.quiet,
            include_args: config.include_args,
            ignore_unhashable: false,
            shard: config.shard,
            write_mode: match config.write_mode {
                WriteModeSetting::Direct => WriteMode::Direct,
                WriteModeSetting::Atomic => WriteMode::Atomic,
            },
            read_policy: match config.retry {
                Some(retry) => ReadPolicy::Retry {
                    attempts: retry.attempts,
                    delay: Duration::from_millis(retry.delay_ms),
                },
                None => ReadPolicy::Fail,
            },
        })
    }
}

/// One layer of optional settings, used both at wrap time and per call.
///
/// Every setter records an explicit choice; unset fields fall through to the
/// next layer.
pub struct CacheOptions<T> {
    cachedir: Option<PathBuf>,
    comment: Option<String>,
    invalidate: Option<bool>,
    format: Option<String>,
    ext: Option<String>,
    compression: Option<bool>,
    on_hit: Option<Transform<T>>,
    on_miss: Option<Transform<T>>,
    quiet: Option<bool>,
    no_caching: Option<bool>,
    name: Option<String>,
    include_args: Option<bool>,
    ignore_unhashable: Option<bool>,
    shard: Option<bool>,
    write_mode: Option<WriteMode>,
    read_policy: Option<ReadPolicy>,
}

impl<T> Default for CacheOptions<T> {
    fn default() -> Self {
        Self {
            cachedir: None,
            comment: None,
            invalidate: None,
            format: None,
            ext: None,
            compression: None,
            on_hit: None,
            on_miss: None,
            quiet: None,
            no_caching: None,
            name: None,
            include_args: None,
            ignore_unhashable: None,
            shard: None,
            write_mode: None,
            read_policy: None,
        }
    }
}

impl<T> Clone for CacheOptions<T> {
    fn clone(&self) -> Self {
        Self {
            cachedir: self.cachedir.clone(),
            comment: self.comment.clone(),
            invalidate: self.invalidate,
            format: self.format.clone(),
            ext: self.ext.clone(),
            compression: self.compression,
            on_hit: self.on_hit.clone(),
            on_miss: self.on_miss.clone(),
            quiet: self.quiet,
            no_caching: self.no_caching,
            name: self.name.clone(),
            include_args: self.include_args,
            ignore_unhashable: self.ignore_unhashable,
            shard: self.shard,
            write_mode: self.write_mode,
            read_policy: self.read_policy,
        }
    }
}

impl<T> fmt::Debug for CacheOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheOptions")
            .field("cachedir", &self.cachedir)
            .field("comment", &self.comment)
            .field("invalidate", &self.invalidate)
            .field("format", &self.format)
            .field("ext", &self.ext)
            .field("compression", &self.compression)
            .field("on_hit", &self.on_hit)
            .field("on_miss", &self.on_miss)
            .field("quiet", &self.quiet)
            .field("no_caching", &self.no_caching)
            .field("name", &self.name)
            .field("include_args", &self.include_args)
            .field("ignore_unhashable", &self.ignore_unhashable)
            .field("shard", &self.shard)
            .field("write_mode", &self.write_mode)
            .field("read_policy", &self.read_policy)
            .finish()
    }
}

impl<T> CacheOptions<T> {
    /// Creates a layer with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Base directory for cache files.
    pub fn cachedir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cachedir = Some(dir.into());
        self
    }

    /// Disambiguator appended to the file name after `_`.
    pub fn cache_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Recompute and overwrite even if an entry exists.
    pub fn invalidate(mut self, invalidate: bool) -> Self {
        self.invalidate = Some(invalidate);
        self
    }

    /// Format token (`json`, `bincode`, `array`). Validated at call time.
    pub fn cache_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Extension string selecting format and compression together, e.g.
    /// `"json.gz"`. When set, it takes the place of both
    /// [`cache_format`](Self::cache_format) and
    /// [`cache_compression`](Self::cache_compression).
    pub fn cache_ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = Some(ext.into());
        self
    }

    /// Whether to gzip cache files.
    pub fn cache_compression(mut self, compression: bool) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Transform applied to values loaded from the cache.
    pub fn on_hit(mut self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.on_hit = Some(Transform::new(f));
        self
    }

    /// Transform applied to freshly computed values. The stored value is
    /// always the untransformed result.
    pub fn on_miss(mut self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.on_miss = Some(Transform::new(f));
        self
    }

    /// Alias of [`on_hit`](Self::on_hit).
    pub fn callback_func_hit(self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.on_hit(f)
    }

    /// Alias of [`on_miss`](Self::on_miss).
    pub fn callback_func_miss(self, f: impl Fn(T) -> T + Send + Sync + 'static) -> Self {
        self.on_miss(f)
    }

    /// Sets the hit transform explicitly, e.g. back to
    /// [`Transform::Identity`] for one call.
    pub fn hit_transform(mut self, transform: Transform<T>) -> Self {
        self.on_hit = Some(transform);
        self
    }

    /// Sets the miss transform explicitly.
    pub fn miss_transform(mut self, transform: Transform<T>) -> Self {
        self.on_miss = Some(transform);
        self
    }

    /// Suppress informational diagnostics.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = Some(quiet);
        self
    }

    /// Bypass the cache entirely.
    pub fn no_caching(mut self, no_caching: bool) -> Self {
        self.no_caching = Some(no_caching);
        self
    }

    /// Overrides the function-identity part of the file name.
    pub fn cache_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Hash the call arguments into the file name.
    pub fn include_args(mut self, include: bool) -> Self {
        self.include_args = Some(include);
        self
    }

    /// Give unhashable arguments a sentinel hash instead of failing.
    pub fn ignore_unhashable(mut self, ignore: bool) -> Self {
        self.ignore_unhashable = Some(ignore);
        self
    }

    /// Spread signed entries over shard directories.
    pub fn shard(mut self, shard: bool) -> Self {
        self.shard = Some(shard);
        self
    }

    /// How files are written.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = Some(mode);
        self
    }

    /// What to do with undecodable files.
    pub fn read_policy(mut self, policy: ReadPolicy) -> Self {
        self.read_policy = Some(policy);
        self
    }
}

/// The outcome of configuration resolution for one call.
#[derive(Debug)]
pub(crate) enum Plan<T> {
    /// Run the function without touching the cache.
    Direct(Bypass),
    /// Go through the cache with these settings.
    Cached(Resolved<T>),
}

/// Why a call skips the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bypass {
    NoDirectory,
    Disabled,
}

/// Fully resolved settings for one cached call.
#[derive(Debug)]
pub(crate) struct Resolved<T> {
    pub cachedir: PathBuf,
    pub name: Option<String>,
    pub comment: Option<String>,
    pub invalidate: bool,
    pub spec: FormatSpec,
    pub on_hit: Transform<T>,
    pub on_miss: Transform<T>,
    pub quiet: bool,
    pub include_args: bool,
    pub ignore_unhashable: bool,
    pub shard: bool,
    pub write_mode: WriteMode,
    pub read_policy: ReadPolicy,
}

/// Picks the first layer that sets a field.
macro_rules! layered {
    ($call:expr, $wrap:expr, $field:ident) => {
        $call.$field.clone().or_else(|| $wrap.$field.clone())
    };
}

/// Returns whether diagnostics are suppressed, even for bypassed calls.
pub(crate) fn resolve_quiet<T>(
    call: &CacheOptions<T>,
    wrap: &CacheOptions<T>,
    global: &GlobalDefaults,
) -> bool {
    layered!(call, wrap, quiet).unwrap_or(global.quiet)
}

/// Merges the three layers into a plan for one call.
///
/// The format is validated here, before anything touches the filesystem.
pub(crate) fn resolve<T>(
    call: &CacheOptions<T>,
    wrap: &CacheOptions<T>,
    global: &GlobalDefaults,
    owner: Option<&dyn CacheDirProvider>,
) -> Result<Plan<T>, CacheError> {
    let cachedir = owner
        .and_then(|o| o.cache_dir().map(Path::to_path_buf))
        .or_else(|| layered!(call, wrap, cachedir))
        .or_else(|| global.cachedir.clone())
        .filter(|dir| !dir.as_os_str().is_empty());
    let Some(cachedir) = cachedir else {
        return Ok(Plan::Direct(Bypass::NoDirectory));
    };
    if layered!(call, wrap, no_caching).unwrap_or(false) {
        return Ok(Plan::Direct(Bypass::Disabled));
    }

    let spec = match layered!(call, wrap, ext) {
        Some(ext) => FormatSpec::parse_ext(&ext)?,
        None => {
            let format = match layered!(call, wrap, format) {
                Some(token) => token.parse()?,
                None => global.format,
            };
            let compression = layered!(call, wrap, compression).unwrap_or(global.compression);
            FormatSpec::new(format, Compression::from(compression))
        }
    };

    Ok(Plan::Cached(Resolved {
        cachedir,
        name: layered!(call, wrap, name),
        comment: layered!(call, wrap, comment),
        invalidate: layered!(call, wrap, invalidate).unwrap_or(false),
        spec,
        on_hit: layered!(call, wrap, on_hit).unwrap_or_default(),
        on_miss: layered!(call, wrap, on_miss).unwrap_or_default(),
        quiet: resolve_quiet(call, wrap, global),
        include_args: layered!(call, wrap, include_args).unwrap_or(global.include_args),
        ignore_unhashable: layered!(call, wrap, ignore_unhashable)
            .unwrap_or(global.ignore_unhashable),
        shard: layered!(call, wrap, shard).unwrap_or(global.shard),
        write_mode: layered!(call, wrap, write_mode).unwrap_or(global.write_mode),
        read_policy: layered!(call, wrap, read_policy).unwrap_or(global.read_policy),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use memo_config::load_config_from_str;

    fn cached(plan: Plan<i32>) -> Resolved<i32> {
        match plan {
            Plan::Cached(r) => r,
            Plan::Direct(why) => panic!("expected cached plan, got {why:?}"),
        }
    }

    struct Owner {
        dir: Option<PathBuf>,
    }

    impl CacheDirProvider for Owner {
        fn cache_dir(&self) -> Option<&Path> {
            self.dir.as_deref()
        }
    }

    #[test]
    fn no_directory_anywhere_bypasses() {
        let plan = resolve::<i32>(
            &CacheOptions::new(),
            &CacheOptions::new(),
            &GlobalDefaults::default(),
            None,
        )
        .unwrap();
        assert!(matches!(plan, Plan::Direct(Bypass::NoDirectory)));
    }

    #[test]
    fn empty_directory_counts_as_none() {
        let plan = resolve::<i32>(
            &CacheOptions::new().cachedir(""),
            &CacheOptions::new(),
            &GlobalDefaults::default(),
            None,
        )
        .unwrap();
        assert!(matches!(plan, Plan::Direct(Bypass::NoDirectory)));
    }

    #[test]
    fn no_caching_bypasses() {
        let plan = resolve::<i32>(
            &CacheOptions::new().no_caching(true),
            &CacheOptions::new().cachedir("c"),
            &GlobalDefaults::default(),
            None,
        )
        .unwrap();
        assert!(matches!(plan, Plan::Direct(Bypass::Disabled)));
    }

    #[test]
    fn call_overrides_wrap_overrides_global() {
        let global = GlobalDefaults {
            cachedir: Some(PathBuf::from("global")),
            format: CacheFormat::Bincode,
            ..GlobalDefaults::default()
        };
        let wrap = CacheOptions::new()
            .cachedir("wrap")
            .cache_comment("w")
            .cache_compression(false);
        let call = CacheOptions::new().cache_comment("c");

        let r = cached(resolve(&call, &wrap, &global, None).unwrap());
        assert_eq!(r.cachedir, PathBuf::from("wrap"));
        assert_eq!(r.comment.as_deref(), Some("c"));
        assert_eq!(r.spec, FormatSpec::new(CacheFormat::Bincode, Compression::None));

        let r = cached(resolve(&CacheOptions::new(), &CacheOptions::new(), &global, None).unwrap());
        assert_eq!(r.cachedir, PathBuf::from("global"));
        assert_eq!(r.spec, FormatSpec::new(CacheFormat::Bincode, Compression::Gzip));
        assert!(r.comment.is_none());
        assert!(!r.invalidate);
    }

    #[test]
    fn owner_directory_wins() {
        let owner = Owner {
            dir: Some(PathBuf::from("owned")),
        };
        let r = cached(
            resolve::<i32>(
                &CacheOptions::new().cachedir("call"),
                &CacheOptions::new(),
                &GlobalDefaults::default(),
                Some(&owner),
            )
            .unwrap(),
        );
        assert_eq!(r.cachedir, PathBuf::from("owned"));
    }

    #[test]
    fn owner_without_directory_falls_back() {
        let owner = Owner { dir: None };
        let r = cached(
            resolve::<i32>(
                &CacheOptions::new().cachedir("call"),
                &CacheOptions::new(),
                &GlobalDefaults::default(),
                Some(&owner),
            )
            .unwrap(),
        );
        assert_eq!(r.cachedir, PathBuf::from("call"));
    }

    #[test]
    fn ext_replaces_format_and_compression() {
        let r = cached(
            resolve::<i32>(
                &CacheOptions::new()
                    .cache_ext("array")
                    .cache_format("json")
                    .cache_compression(true),
                &CacheOptions::new().cachedir("c"),
                &GlobalDefaults::default(),
                None,
            )
            .unwrap(),
        );
        assert_eq!(r.spec, FormatSpec::new(CacheFormat::Array, Compression::None));
    }

    #[test]
    fn unsupported_format_fails() {
        let err = resolve::<i32>(
            &CacheOptions::new().cache_format("msgpack"),
            &CacheOptions::new().cachedir("c"),
            &GlobalDefaults::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedFormat { .. }));

        let err = resolve::<i32>(
            &CacheOptions::new(),
            &CacheOptions::new().cachedir("c").cache_ext("yaml.gz"),
            &GlobalDefaults::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedFormat { .. }));
    }

    #[test]
    fn unsupported_format_ignored_when_bypassing() {
        let plan = resolve::<i32>(
            &CacheOptions::new().cache_format("msgpack"),
            &CacheOptions::new(),
            &GlobalDefaults::default(),
            None,
        )
        .unwrap();
        assert!(matches!(plan, Plan::Direct(Bypass::NoDirectory)));
    }

    #[test]
    fn transforms_layer() {
        let wrap = CacheOptions::new().cachedir("c").on_hit(|v: i32| v + 1);
        let call = CacheOptions::new().on_miss(|v: i32| v * 10);
        let r = cached(resolve(&call, &wrap, &GlobalDefaults::default(), None).unwrap());
        assert_eq!(r.on_hit.apply(1), 2);
        assert_eq!(r.on_miss.apply(1), 10);

        let call = CacheOptions::new().hit_transform(Transform::Identity);
        let r = cached(resolve(&call, &wrap, &GlobalDefaults::default(), None).unwrap());
        assert_eq!(r.on_hit.apply(1), 1);
    }

    #[test]
    fn quiet_layers_over_global() {
        let global = GlobalDefaults {
            quiet: true,
            ..GlobalDefaults::default()
        };
        let none = CacheOptions::<i32>::new();
        assert!(resolve_quiet(&none, &none, &global));
        assert!(!resolve_quiet(&CacheOptions::new().quiet(false), &none, &global));
    }

    #[test]
    fn defaults_from_config() {
        let config = load_config_from_str(
            r#"
[cache]
dir = "/tmp/memo"
format = "array"
compression = false
include_args = true
write_mode = "atomic"

[cache.retry]
attempts = 4
delay_ms = 25
"#,
        )
        .unwrap();
        let defaults = GlobalDefaults::from_config(&config.cache).unwrap();
        assert_eq!(defaults.cachedir, Some(PathBuf::from("/tmp/memo")));
        assert_eq!(defaults.format, CacheFormat::Array);
        assert!(!defaults.compression);
        assert!(defaults.include_args);
        assert_eq!(defaults.write_mode, WriteMode::Atomic);
        assert_eq!(
            defaults.read_policy,
            ReadPolicy::Retry {
                attempts: 4,
                delay: Duration::from_millis(25)
            }
        );
    }

    #[test]
    fn config_with_unknown_format_is_rejected() {
        let config = load_config_from_str("[cache]\nformat = \"xml\"\n").unwrap();
        let err = GlobalDefaults::from_config(&config.cache).unwrap_err();
        assert!(matches!(err, CacheError::UnsupportedFormat { token } if token == "xml"));
    }

    #[test]
    fn transform_debug_hides_closure() {
        let t: Transform<i32> = Transform::new(|v| v);
        assert_eq!(format!("{t:?}"), "Apply(..)");
        assert_eq!(format!("{:?}", Transform::<i32>::Identity), "Identity");
    }
}
