// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the configuration map attached to each heuristic.
//! A configuration string is a `:`-separated list of `key=value` pairs;
//! keys prefixed with `group@` address the parameters of a nested routine
//! (for instance `ls@maxSamples=10000` configures the local-search routine
//! of a VNS).

use std::collections::BTreeMap;
use std::str::FromStr;

/// The ways a configuration string or value can be rejected.
#[derive(Debug, thiserror::Error)]
pub enum ParamError {
    #[error("invalid key-value pair in configuration string: {0}")]
    InvalidPair(String),
    #[error("invalid use of group marker '@' in parameter '{0}'")]
    InvalidGroup(String),
    #[error("invalid value '{value}' for parameter '{key}'")]
    InvalidValue { key: String, value: String },
}

/// A string-to-string map of configuration parameters with typed lookup.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    params: BTreeMap<String, String>,
}

impl ParameterMap {
    /// Parses a `k1=v1:k2=v2` configuration string. Empty pairs are skipped
    /// so that an empty string denotes an empty configuration.
    pub fn parse(config: &str) -> Result<Self, ParamError> {
        let mut params = BTreeMap::new();
        for pair in config.split(':') {
            if pair.is_empty() {
                continue;
            }
            let kv: Vec<&str> = pair.split('=').collect();
            match kv.as_slice() {
                [key, value] if !key.is_empty() => {
                    params.insert(key.to_string(), value.to_string());
                }
                _ => return Err(ParamError::InvalidPair(pair.to_string())),
            }
        }
        Ok(ParameterMap { params })
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }

    /// The value of `key` parsed as `T`, or `default` when absent.
    pub fn get_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, ParamError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| ParamError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
            }),
        }
    }

    /// The value of `key` as a string, or `default` when absent.
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.params.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    /// Boolean parameters accept `true`/`false` as well as `1`/`0`.
    pub fn get_flag_or(&self, key: &str, default: bool) -> Result<bool, ParamError> {
        match self.params.get(key) {
            None => Ok(default),
            Some(raw) => match raw.as_str() {
                "1" | "true" => Ok(true),
                "0" | "false" => Ok(false),
                _ => Err(ParamError::InvalidValue {
                    key: key.to_string(),
                    value: raw.clone(),
                }),
            },
        }
    }

    /// Extracts the parameters addressed to a nested routine: every
    /// `prefix@key=value` entry becomes `key=value` in the returned map.
    pub fn group(&self, prefix: &str) -> Result<ParameterMap, ParamError> {
        let marker = format!("{prefix}@");
        let mut params = BTreeMap::new();
        for (key, value) in self.params.iter() {
            if let Some(inner) = key.strip_prefix(&marker) {
                if inner.is_empty() || inner.contains('@') {
                    return Err(ParamError::InvalidGroup(key.clone()));
                }
                params.insert(inner.to_string(), value.clone());
            }
        }
        Ok(ParameterMap { params })
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_params {
    use super::*;

    #[test]
    fn an_empty_string_is_an_empty_map() {
        let map = ParameterMap::parse("").unwrap();
        assert!(!map.has("anything"));
    }

    #[test]
    fn pairs_are_split_on_colons() {
        let map = ParameterMap::parse("kMin=2:kMax=50").unwrap();
        assert_eq!(2u64, map.get_or("kMin", 0).unwrap());
        assert_eq!(50u64, map.get_or("kMax", 0).unwrap());
        assert_eq!(7u64, map.get_or("kStep", 7).unwrap());
    }

    #[test]
    fn a_pair_without_value_is_rejected() {
        assert!(ParameterMap::parse("kMin").is_err());
        assert!(ParameterMap::parse("=3").is_err());
    }

    #[test]
    fn garbage_values_are_reported_with_their_key() {
        let map = ParameterMap::parse("kMin=banana").unwrap();
        let err = map.get_or("kMin", 0u64).unwrap_err();
        assert!(matches!(err, ParamError::InvalidValue { .. }));
    }

    #[test]
    fn flags_accept_numeric_and_textual_spellings() {
        let map = ParameterMap::parse("a=1:b=false").unwrap();
        assert!(map.get_flag_or("a", false).unwrap());
        assert!(!map.get_flag_or("b", true).unwrap());
        assert!(map.get_flag_or("missing", true).unwrap());
    }

    #[test]
    fn groups_strip_their_prefix() {
        let map = ParameterMap::parse("ls=optimized:ls@maxSamples=10000:shake@maxTrials=50")
            .unwrap();
        let ls = map.group("ls").unwrap();
        assert_eq!(10000u64, ls.get_or("maxSamples", 0).unwrap());
        assert!(!ls.has("maxTrials"));
        let shake = map.group("shake").unwrap();
        assert_eq!(50u64, shake.get_or("maxTrials", 0).unwrap());
    }

    #[test]
    fn nested_group_markers_are_rejected() {
        let map = ParameterMap::parse("ls@inner@deep=1").unwrap();
        assert!(map.group("ls").is_err());
    }
}
