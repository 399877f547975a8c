//! Entry points exposed by each contract of the environment, split into read-only views and
//! state-mutating changes. A [`crate::session::ContractHandle`] only issues calls listed here.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractAbi {
    pub name: &'static str,
    pub view_methods: &'static [&'static str],
    pub change_methods: &'static [&'static str],
}

impl ContractAbi {
    pub fn is_view(&self, method: &str) -> bool {
        self.view_methods.contains(&method)
    }

    pub fn is_change(&self, method: &str) -> bool {
        self.change_methods.contains(&method)
    }
}

pub const USN: ContractAbi = ContractAbi {
    name: "usn",
    view_methods: &[
        "version",
        "name",
        "symbol",
        "decimals",
        "spread",
        "contract_status",
        "owner",
        "ft_balance_of",
        "ft_total_supply",
        "ft_metadata",
        "storage_balance_of",
        "blacklist_status",
        "guardians",
        "predict_buy",
        "predict_sell",
        "commission",
        "treasury",
    ],
    change_methods: &[
        "new",
        "upgrade_name_symbol",
        "upgrade_icon",
        "set_owner",
        "extend_guardians",
        "remove_guardians",
        "add_to_blacklist",
        "remove_from_blacklist",
        "destroy_black_funds",
        "pause",
        "resume",
        "set_fixed_spread",
        "set_adaptive_spread",
        "buy",
        "sell",
        "ft_transfer",
        "ft_transfer_call",
        "storage_deposit",
        "transfer_stable_liquidity",
        "balance_stable_pool",
        "balance_treasury",
        "withdraw_commission",
    ],
};

pub const USDT: ContractAbi = ContractAbi {
    name: "usdt",
    view_methods: &[
        "ft_balance_of",
        "ft_total_supply",
        "ft_metadata",
        "storage_balance_of",
    ],
    change_methods: &[
        "new",
        "mint",
        "burn",
        "ft_transfer",
        "ft_transfer_call",
        "storage_deposit",
    ],
};

pub const REF_EXCHANGE: ContractAbi = ContractAbi {
    name: "ref",
    view_methods: &[
        "get_number_of_pools",
        "get_pool",
        "get_pools",
        "get_stable_pool",
        "get_pool_shares",
        "get_deposits",
        "get_deposit",
        "get_return",
        "get_whitelisted_tokens",
        "get_user_whitelisted_tokens",
        "storage_balance_of",
        "predict_remove_liquidity",
    ],
    change_methods: &[
        "new",
        "storage_deposit",
        "register_tokens",
        "unregister_tokens",
        "extend_whitelisted_tokens",
        "add_stable_swap_pool",
        "add_stable_liquidity",
        "remove_liquidity_by_tokens",
        "swap",
        "withdraw",
        "mft_register",
    ],
};

pub const PRICE_ORACLE: ContractAbi = ContractAbi {
    name: "priceoracle",
    view_methods: &[
        "get_oracle",
        "get_oracles",
        "get_asset",
        "get_assets",
        "get_price_data",
        "get_recency_duration_sec",
    ],
    change_methods: &[
        "new",
        "add_oracle",
        "remove_oracle",
        "add_asset",
        "add_asset_ema",
        "report_prices",
        "set_recency_duration_sec",
        "oracle_call",
    ],
};

/// Constructor entry point shared by every contract of the environment.
pub const INIT_METHOD: &str = "new";
