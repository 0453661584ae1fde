use crate::services::discovery::{MethodDescriptor, ParameterMeta};
use crate::services::tool_builder::ToolBuilder;
use crate::services::tool_registry::ToolHandler;
use std::sync::Arc;

fn param(name: &str, param_type: &str, required: bool) -> ParameterMeta {
    ParameterMeta {
        name: name.to_string(),
        param_type: param_type.to_string(),
        required,
        description: None,
        length: None,
    }
}

fn descriptor(name: &str, is_async: bool, parameters: Vec<ParameterMeta>) -> MethodDescriptor {
    MethodDescriptor {
        name: name.to_string(),
        description: String::new(),
        is_async,
        parameters,
    }
}

pub fn list_virtual_machines() -> MethodDescriptor {
    descriptor(
        "listVirtualMachines",
        false,
        vec![
            param("keyword", "string", false),
            param("id", "uuid", false),
            param("name", "string", false),
            param("state", "string", false),
            param("zoneid", "uuid", false),
            param("projectid", "uuid", false),
            param("domainid", "uuid", false),
            param("account", "string", false),
            param("listall", "boolean", false),
            param("details", "list", false),
            param("page", "integer", false),
            param("pagesize", "integer", false),
        ],
    )
}

pub fn start_virtual_machine() -> MethodDescriptor {
    descriptor(
        "startVirtualMachine",
        true,
        vec![
            param("id", "uuid", true),
            param("hostid", "uuid", false),
            param("clusterid", "uuid", false),
            param("podid", "uuid", false),
            param("considerlasthost", "boolean", false),
            param("bootintosetup", "boolean", false),
        ],
    )
}

pub fn stop_virtual_machine() -> MethodDescriptor {
    descriptor(
        "stopVirtualMachine",
        true,
        vec![param("id", "uuid", true), param("forced", "boolean", false)],
    )
}

/// Fixed VM tools run through the same handler as generated ones.
pub fn vm_tool_handlers(builder: &ToolBuilder) -> Vec<(&'static str, Arc<dyn ToolHandler>)> {
    vec![
        (
            "mold_listVirtualMachines",
            builder.handler_for(list_virtual_machines()),
        ),
        (
            "mold_startVirtualMachine",
            builder.handler_for(start_virtual_machine()),
        ),
        (
            "mold_stopVirtualMachine",
            builder.handler_for(stop_virtual_machine()),
        ),
    ]
}
