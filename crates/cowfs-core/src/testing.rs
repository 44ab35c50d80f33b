// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Test-only utilities and mock implementations for CoWFS Core

#[cfg(test)]
pub mod mock_store;
