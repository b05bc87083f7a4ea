// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! StoreObject implementations for the API object model

use crate::store::StoreObject;
use furiko_core::job::Job;
use furiko_core::jobconfig::JobConfig;
use furiko_core::meta::ObjectMeta;

impl StoreObject for Job {
    const KIND: &'static str = "Job";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

impl StoreObject for JobConfig {
    const KIND: &'static str = "JobConfig";

    fn metadata(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}
