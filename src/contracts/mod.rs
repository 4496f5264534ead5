use alloy::sol;

sol! {
    #[sol(rpc)]
    PoolDistributor,
    "src/contracts/ABI/PoolDistributor.json"
}

sol! {
    #[sol(rpc)]
    IERC20,
    "src/contracts/ABI/IERC20.json"
}

sol! {
    #[sol(rpc)]
    SuperfluidPool,
    "src/contracts/ABI/SuperfluidPool.json"
}
