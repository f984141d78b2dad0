// Copyright (c) 2026 appujet, notdeltaxd and contributors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub mod common;
pub mod config;
pub mod download;
pub mod duplicate;
pub mod format;
pub mod normalizer;
pub mod options;
pub mod path_resolver;
pub mod pipeline;
pub mod playlist;
pub mod progress;
pub mod sources;
pub mod tagger;
pub mod validator;
