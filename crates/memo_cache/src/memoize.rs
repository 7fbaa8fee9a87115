//! The memoizing wrapper.
//!
//! Every call walks the same states: resolve configuration, resolve the
//! cache path, then either read the stored result (hit) or run the function
//! and store its raw result (miss). The miss transform only shapes the value
//! returned from that call; the file always holds the untransformed result,
//! which later hits replay through the hit transform.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::args::{BoundArgs, CallArgs, ParamTable};
use crate::backend;
use crate::error::CacheError;
use crate::key::{ArgSignature, CacheKey};
use crate::options::{self, Bypass, CacheDirProvider, CacheOptions, GlobalDefaults, Plan, Resolved};

/// Error returned by a memoized call.
#[derive(Debug)]
pub enum MemoError<E> {
    /// The wrapped function failed. Nothing was cached.
    Function(E),
    /// The cache layer failed.
    Cache(CacheError),
}

impl<E> MemoError<E> {
    /// Returns the wrapped function's error, if that is what failed.
    pub fn into_function_error(self) -> Option<E> {
        match self {
            MemoError::Function(e) => Some(e),
            MemoError::Cache(_) => None,
        }
    }

    /// Returns the cache error, if that is what failed.
    pub fn cache_error(&self) -> Option<&CacheError> {
        match self {
            MemoError::Function(_) => None,
            MemoError::Cache(e) => Some(e),
        }
    }
}

impl<E: fmt::Display> fmt::Display for MemoError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoError::Function(e) => write!(f, "{e}"),
            MemoError::Cache(e) => write!(f, "{e}"),
        }
    }
}

impl<E: std::error::Error> std::error::Error for MemoError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemoError::Function(e) => e.source(),
            MemoError::Cache(e) => e.source(),
        }
    }
}

impl<E> From<CacheError> for MemoError<E> {
    fn from(e: CacheError) -> Self {
        MemoError::Cache(e)
    }
}

/// A function wrapped with a disk cache.
///
/// `F` receives the bound arguments and returns `Result<T, E>`; `T` must
/// round-trip through the configured format.
pub struct Memoized<F, T> {
    name: String,
    func: F,
    params: ParamTable,
    options: CacheOptions<T>,
    defaults: GlobalDefaults,
}

impl<F, T> Memoized<F, T> {
    /// Wraps `func` under the identity `name`.
    ///
    /// Leading and trailing ASCII punctuation is stripped from the name, so
    /// `"_load"` and `"load"` share cache files.
    pub fn new<E>(name: &str, func: F) -> Self
    where
        F: Fn(&BoundArgs) -> Result<T, E>,
    {
        Self {
            name: clean_name(name),
            func,
            params: ParamTable::new(),
            options: CacheOptions::new(),
            defaults: GlobalDefaults::default(),
        }
    }

    /// Declares the function's parameters and their defaults.
    pub fn with_params(mut self, params: ParamTable) -> Self {
        self.params = params;
        self
    }

    /// Sets the wrap-time option layer.
    pub fn with_options(mut self, options: CacheOptions<T>) -> Self {
        self.options = options;
        self
    }

    /// Sets the process-wide defaults used by this wrapper.
    pub fn with_defaults(mut self, defaults: GlobalDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// The function identity used in file names.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns where a call with these arguments would be cached, or `None`
    /// if it would bypass the cache. Nothing on disk is touched.
    pub fn cache_path(
        &self,
        args: &CallArgs,
        call_options: &CacheOptions<T>,
    ) -> Result<Option<PathBuf>, CacheError> {
        match options::resolve(call_options, &self.options, &self.defaults, None)? {
            Plan::Direct(_) => Ok(None),
            Plan::Cached(resolved) => {
                let key = self.key_for(&self.params.bind(args), &resolved)?;
                Ok(Some(key.path_in(&resolved.cachedir)))
            }
        }
    }

    fn key_for(&self, bound: &BoundArgs, resolved: &Resolved<T>) -> Result<CacheKey, CacheError> {
        let signature = if resolved.include_args {
            Some(ArgSignature::of(bound, resolved.ignore_unhashable)?)
        } else {
            None
        };
        let key = CacheKey {
            name: resolved
                .name
                .as_deref()
                .map(clean_name)
                .unwrap_or_else(|| self.name.clone()),
            comment: resolved.comment.clone(),
            signature,
            spec: resolved.spec,
            shard: resolved.shard,
        };
        key.validate()?;
        Ok(key)
    }
}

impl<F, T> Memoized<F, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Calls through the cache with the wrap-time options.
    pub fn call<E>(&self, args: &CallArgs) -> Result<T, MemoError<E>>
    where
        F: Fn(&BoundArgs) -> Result<T, E>,
    {
        self.invoke(args, &CacheOptions::new(), None)
    }

    /// Calls through the cache with per-call overrides.
    pub fn call_with<E>(
        &self,
        args: &CallArgs,
        call_options: &CacheOptions<T>,
    ) -> Result<T, MemoError<E>>
    where
        F: Fn(&BoundArgs) -> Result<T, E>,
    {
        self.invoke(args, call_options, None)
    }

    /// Calls on behalf of `owner`, whose cache directory, if it has one,
    /// overrides every option layer.
    pub fn call_method<E>(
        &self,
        owner: &dyn CacheDirProvider,
        args: &CallArgs,
        call_options: &CacheOptions<T>,
    ) -> Result<T, MemoError<E>>
    where
        F: Fn(&BoundArgs) -> Result<T, E>,
    {
        self.invoke(args, call_options, Some(owner))
    }

    fn invoke<E>(
        &self,
        args: &CallArgs,
        call_options: &CacheOptions<T>,
        owner: Option<&dyn CacheDirProvider>,
    ) -> Result<T, MemoError<E>>
    where
        F: Fn(&BoundArgs) -> Result<T, E>,
    {
        let bound = self.params.bind(args);
        let resolved = match options::resolve(call_options, &self.options, &self.defaults, owner)? {
            Plan::Cached(resolved) => resolved,
            Plan::Direct(bypass) => {
                if bypass == Bypass::NoDirectory
                    && !options::resolve_quiet(call_options, &self.options, &self.defaults)
                {
                    tracing::warn!("no cache directory for {}; calling it uncached", self.name);
                }
                return (self.func)(&bound).map_err(MemoError::Function);
            }
        };

        let key = self.key_for(&bound, &resolved)?;
        let dir = key.dir_in(&resolved.cachedir);
        if !dir.is_dir() {
            tracing::info!("creating cache directory {}", dir.display());
            fs::create_dir_all(&dir).map_err(|source| CacheError::Io {
                path: dir.clone(),
                source,
            })?;
        }
        let path = dir.join(key.file_name());

        if !resolved.invalidate && path.exists() {
            tracing::debug!("cache hit {}", path.display());
            let stored: T = backend::read(resolved.spec, &path, resolved.read_policy)?;
            return Ok(resolved.on_hit.apply(stored));
        }

        let raw = (self.func)(&bound).map_err(MemoError::Function)?;
        if !resolved.quiet {
            tracing::info!("generating {}", path.display());
        }
        backend::write(&raw, resolved.spec, &path, resolved.write_mode)?;
        Ok(resolved.on_miss.apply(raw))
    }
}

impl<F, T> fmt::Debug for Memoized<F, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("options", &self.options)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

fn clean_name(name: &str) -> String {
    let trimmed = name.trim_matches(|c: char| c.is_ascii_punctuation());
    if trimmed.is_empty() {
        name.to_string()
    } else {
        trimmed.to_string()
    }
}
