// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Bayeux channel name validation.
//!
//! Grounded on `original_source/src/faye/protocol/bayeux.py::_validate_channel`:
//! the two call sites (subscribe, publish) differ only in the wording of the
//! error raised against meta/service channels, so this module exposes one
//! validator per operation rather than threading an enum through a shared
//! function.

use crate::error::ValidationError;

const META_PREFIX: &str = "/meta/";
const SERVICE_PREFIX: &str = "/service/";

/// Validates `channel` as a subscribe target.
pub fn validate_for_subscribe(channel: &str) -> Result<(), ValidationError> {
    validate_shape(channel)?;
    if channel.starts_with(META_PREFIX) || channel.starts_with(SERVICE_PREFIX) {
        return Err(ValidationError::NotSubscribable);
    }
    Ok(())
}

/// Validates `channel` as a publish target.
pub fn validate_for_publish(channel: &str) -> Result<(), ValidationError> {
    validate_shape(channel)?;
    if channel.starts_with(META_PREFIX) || channel.starts_with(SERVICE_PREFIX) {
        return Err(ValidationError::NotPublishable);
    }
    Ok(())
}

/// Shape checks shared by both operations: non-empty, leading slash, no
/// empty interior segments, wildcards only as whole segments, `**` only as
/// the final segment.
fn validate_shape(channel: &str) -> Result<(), ValidationError> {
    if channel.is_empty() {
        return Err(ValidationError::EmptyChannel);
    }
    if !channel.starts_with('/') {
        return Err(ValidationError::MissingLeadingSlash);
    }

    let segments: Vec<&str> = channel.split('/').collect();
    if segments[1..].iter().any(|s| s.is_empty()) {
        return Err(ValidationError::EmptySegment);
    }

    for (i, segment) in segments.iter().enumerate().skip(1) {
        if *segment == "**" && i != segments.len() - 1 {
            return Err(ValidationError::MisplacedGlob);
        }
        if segment.contains('*') && *segment != "*" && *segment != "**" {
            return Err(ValidationError::PartialWildcard);
        }
    }

    Ok(())
}
